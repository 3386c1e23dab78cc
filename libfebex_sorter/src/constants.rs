//! Constants describing the FEBEX word format, the block container, and the
//! default engine parameters tied to the 100 MHz sampling clock.

/// Size of a single FEBEX word in bytes. All words are 64-bit little-endian.
pub const WORD_SIZE: usize = 8;

// Word type lives in the top two bits of every word.
pub const WORD_TYPE_SHIFT: u32 = 62;
pub const WORD_TYPE_MASK: u64 = 0x3;
pub const WORD_TYPE_ADC: u64 = 0x3;
pub const WORD_TYPE_INFO: u64 = 0x2;
pub const WORD_TYPE_TRACE_HEADER: u64 = 0x1;
pub const WORD_TYPE_SAMPLES: u64 = 0x0;

// ADC data word layout
pub const ADC_PILEUP_SHIFT: u32 = 61;
pub const ADC_CLIP_SHIFT: u32 = 60;
pub const ADC_SFP_SHIFT: u32 = 58;
pub const ADC_SFP_MASK: u64 = 0x3;
pub const ADC_BOARD_SHIFT: u32 = 54;
pub const ADC_BOARD_MASK: u64 = 0xF;
pub const ADC_CHANNEL_SHIFT: u32 = 50;
pub const ADC_CHANNEL_MASK: u64 = 0xF;
pub const ADC_LSB_SHIFT: u32 = 16;
pub const ADC_LSB_MASK: u64 = 0x0FFF_FFFF;
pub const ADC_VALUE_MASK: u64 = 0xFFFF;

// Info word layout
pub const INFO_CODE_SHIFT: u32 = 58;
pub const INFO_CODE_MASK: u64 = 0xF;
pub const INFO_SFP_SHIFT: u32 = 56;
pub const INFO_SFP_MASK: u64 = 0x3;
pub const INFO_BOARD_SHIFT: u32 = 52;
pub const INFO_BOARD_MASK: u64 = 0xF;
pub const INFO_CHANNEL_SHIFT: u32 = 48;
pub const INFO_CHANNEL_MASK: u64 = 0xF;
pub const INFO_FIELD_MASK: u64 = 0x0FFF_FFFF;

// Info codes. Pulse-type codes (EBIS, SYNC, PAUSE, RESUME) carry the pulse
// timestamp LSB in the field; register codes carry the register value.
pub const INFO_CODE_EBIS: u8 = 0x1;
pub const INFO_CODE_SYNC: u8 = 0x2;
pub const INFO_CODE_TS_MSB: u8 = 0x4;
pub const INFO_CODE_TS_HSB: u8 = 0x5;
pub const INFO_CODE_PAUSE: u8 = 0xE;
pub const INFO_CODE_RESUME: u8 = 0xF;

// Trace header layout. SFP/board/channel sit in the same lanes as in the ADC
// word; the sample count is in the bottom 16 bits. Sample words pack four
// 14-bit samples into 16-bit lanes, so their top two bits are always zero.
pub const TRACE_SAMPLES_MASK: u64 = 0xFFFF;
pub const SAMPLES_PER_WORD: usize = 4;
pub const SAMPLE_LANE_BITS: u32 = 16;
pub const SAMPLE_MASK: u64 = 0x3FFF;

/// Block container written by the DAQ. A block is a fixed 32 KiB buffer:
/// a 16-byte header followed by up to [`BLOCK_WORDS`] payload words.
pub const BLOCK_SIZE: usize = 32 * 1024;
pub const BLOCK_HEADER_SIZE: usize = 16;
pub const BLOCK_WORDS: usize = (BLOCK_SIZE - BLOCK_HEADER_SIZE) / WORD_SIZE;
/// Block magic, the bytes "FBLK" read as a little-endian u32.
pub const BLOCK_MAGIC: u32 = 0x4B4C_4246;

/// Extension used by the DAQ for raw segment files.
pub const SEGMENT_EXTENSION: &str = ".febex";

// Crate geometry
pub const NUMBER_OF_SFPS: u8 = 4;
pub const BOARDS_PER_SFP: u8 = 16;
pub const CHANNELS_PER_BOARD: u8 = 16;

/// The FEBEX timestamp clock runs at 100 MHz, i.e. one tick every 10 ns.
pub const TIMESTAMP_CLOCK_HZ: u64 = 100_000_000;

// Default split of the reconstructed timestamp across the three hardware
// registers. 28 + 20 + 12 = 60 bits, leaving headroom in an i64 for the
// per-source epoch counter on top.
pub const DEFAULT_LSB_BITS: u32 = 28;
pub const DEFAULT_MSB_BITS: u32 = 20;
pub const DEFAULT_HSB_BITS: u32 = 12;

/// Widest layout the codec accepts; epochs must still fit a signed 64-bit
/// timestamp above the composed registers.
pub const MAX_LAYOUT_BITS: u32 = 62;

/// Default backward tolerance separating a warp from a mash: one full LSB
/// wrap span (2^28 ticks, about 2.7 s of clock). A fragment race can displace
/// a timestamp by at most this much.
pub const DEFAULT_WARP_TOLERANCE: i64 = 1 << DEFAULT_LSB_BITS;

/// Default forward delta above which an accepted group is counted as a jump:
/// 2^32 ticks, about 43 s of clock, far beyond any in-spill gap.
pub const DEFAULT_JUMP_THRESHOLD: i64 = 1 << 32;

/// Default EBIS acceptance window, 4 000 000 ticks = 40 ms after each pulse.
pub const DEFAULT_EBIS_WINDOW: i64 = 4_000_000;
