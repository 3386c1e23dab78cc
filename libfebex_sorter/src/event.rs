use super::hardware_id::SourceId;

/// Payload of a decoded packet.
///
/// Adc packets carry the physics; pulse packets are kept in the stream so the
/// EBIS and SYNC markers land in the output at their proper place in time.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    Adc {
        value: u16,
        energy: f64,
        pileup: bool,
        clip: bool,
        trace: Option<Vec<u16>>,
    },
    EbisPulse,
    SyncPulse,
}

impl PacketBody {
    /// Numeric tag written to the output rows.
    pub fn kind_code(&self) -> u8 {
        match self {
            PacketBody::Adc { .. } => 0,
            PacketBody::EbisPulse => 1,
            PacketBody::SyncPulse => 2,
        }
    }
}

/// One decoded, timestamped record headed for the ordered output stream.
///
/// Immutable after assembly; ownership moves from the converter into the
/// ordering buffer and on to the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPacket {
    pub source: SourceId,
    pub timestamp: i64,
    /// Result of the EBIS gate test at this packet's timestamp.
    pub beam_on: bool,
    pub body: PacketBody,
}

impl EventPacket {
    pub fn has_trace(&self) -> bool {
        matches!(
            self.body,
            PacketBody::Adc {
                trace: Some(_),
                ..
            }
        )
    }
}
