use crate::constants::{BOARDS_PER_SFP, CHANNELS_PER_BOARD};

/// SourceId is the full hardware address of one FEBEX channel.
///
/// The DAQ fans out over SFP links, each link carrying several FEBEX boards,
/// each board carrying sixteen channels. Every timestamped word in the stream
/// names its source with this triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub sfp: u8,
    pub board: u8,
    pub channel: u8,
}

impl SourceId {
    pub fn new(sfp: u8, board: u8, channel: u8) -> Self {
        SourceId {
            sfp,
            board,
            channel,
        }
    }

    /// The board-level address with the channel zeroed, used for bookkeeping
    /// that is shared by all channels of a module (pauses, resumes, syncs).
    pub fn board_id(&self) -> SourceId {
        SourceId::new(self.sfp, self.board, 0)
    }

    pub fn uuid(&self) -> u64 {
        generate_uuid(self.sfp, self.board, self.channel)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sfp {} board {} channel {}",
            self.sfp, self.board, self.channel
        )
    }
}

/// Generate a unique id number for a given hardware location
pub fn generate_uuid(sfp: u8, board: u8, channel: u8) -> u64 {
    (channel as u64) + (board as u64) * 100 + (sfp as u64) * 10_000
}

/// Upper bound (exclusive) on [`generate_uuid`] values, sized for occupancy
/// bit sets.
pub fn uuid_bound() -> usize {
    generate_uuid(
        crate::constants::NUMBER_OF_SFPS,
        BOARDS_PER_SFP,
        CHANNELS_PER_BOARD,
    ) as usize
}
