//! Decoder for the 64-bit FEBEX word format.
//!
//! Every payload word carries its type in the top two bits: ADC data words,
//! info words (timestamp registers and pulse markers), trace headers, and
//! packed sample words. Field extraction is pure shift-and-mask against the
//! layout in [`crate::constants`].

use super::constants::*;
use super::error::WordError;
use super::hardware_id::SourceId;

/// The info-word codes emitted by the FEBEX firmware.
///
/// Pulse-type codes (EBIS, SYNC, PAUSE, RESUME) carry the pulse timestamp
/// LSB in the field lane; the register codes carry the register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoCode {
    EbisPulse,
    SyncPulse,
    TimestampMsb,
    TimestampHsb,
    Pause,
    Resume,
}

impl InfoCode {
    /// True for codes whose field is a timestamp LSB completing a group.
    pub fn is_pulse(&self) -> bool {
        matches!(
            self,
            InfoCode::EbisPulse | InfoCode::SyncPulse | InfoCode::Pause | InfoCode::Resume
        )
    }

    /// The raw firmware code carried in the word's code lane.
    pub fn code(&self) -> u8 {
        match self {
            InfoCode::EbisPulse => INFO_CODE_EBIS,
            InfoCode::SyncPulse => INFO_CODE_SYNC,
            InfoCode::TimestampMsb => INFO_CODE_TS_MSB,
            InfoCode::TimestampHsb => INFO_CODE_TS_HSB,
            InfoCode::Pause => INFO_CODE_PAUSE,
            InfoCode::Resume => INFO_CODE_RESUME,
        }
    }
}

impl TryFrom<u8> for InfoCode {
    type Error = WordError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            INFO_CODE_EBIS => Ok(InfoCode::EbisPulse),
            INFO_CODE_SYNC => Ok(InfoCode::SyncPulse),
            INFO_CODE_TS_MSB => Ok(InfoCode::TimestampMsb),
            INFO_CODE_TS_HSB => Ok(InfoCode::TimestampHsb),
            INFO_CODE_PAUSE => Ok(InfoCode::Pause),
            INFO_CODE_RESUME => Ok(InfoCode::Resume),
            _ => Err(WordError::UnknownInfoCode(value)),
        }
    }
}

/// A decoded ADC data word: one energy measurement on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcWord {
    pub id: SourceId,
    /// Timestamp LSB register value latched at the trigger.
    pub lsb: u32,
    pub value: u16,
    pub pileup: bool,
    pub clip: bool,
}

/// A decoded info word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoWord {
    pub id: SourceId,
    pub code: InfoCode,
    pub field: u32,
}

/// A decoded trace header. The following ceil(samples/4) words carry the
/// packed samples, and the finished trace attaches to the next ADC word
/// from the same source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHeader {
    pub id: SourceId,
    pub samples: u16,
}

/// One classified FEBEX word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataWord {
    Adc(AdcWord),
    Info(InfoWord),
    TraceHeader(TraceHeader),
    /// Raw packed sample word; unpacked by the consumer holding the header.
    Samples(u64),
}

impl TryFrom<u64> for DataWord {
    type Error = WordError;

    fn try_from(word: u64) -> Result<Self, Self::Error> {
        match (word >> WORD_TYPE_SHIFT) & WORD_TYPE_MASK {
            WORD_TYPE_ADC => Ok(DataWord::Adc(AdcWord {
                id: SourceId::new(
                    ((word >> ADC_SFP_SHIFT) & ADC_SFP_MASK) as u8,
                    ((word >> ADC_BOARD_SHIFT) & ADC_BOARD_MASK) as u8,
                    ((word >> ADC_CHANNEL_SHIFT) & ADC_CHANNEL_MASK) as u8,
                ),
                lsb: ((word >> ADC_LSB_SHIFT) & ADC_LSB_MASK) as u32,
                value: (word & ADC_VALUE_MASK) as u16,
                pileup: (word >> ADC_PILEUP_SHIFT) & 0x1 == 0x1,
                clip: (word >> ADC_CLIP_SHIFT) & 0x1 == 0x1,
            })),
            WORD_TYPE_INFO => {
                let code = InfoCode::try_from(((word >> INFO_CODE_SHIFT) & INFO_CODE_MASK) as u8)?;
                Ok(DataWord::Info(InfoWord {
                    id: SourceId::new(
                        ((word >> INFO_SFP_SHIFT) & INFO_SFP_MASK) as u8,
                        ((word >> INFO_BOARD_SHIFT) & INFO_BOARD_MASK) as u8,
                        ((word >> INFO_CHANNEL_SHIFT) & INFO_CHANNEL_MASK) as u8,
                    ),
                    code,
                    field: (word & INFO_FIELD_MASK) as u32,
                }))
            }
            WORD_TYPE_TRACE_HEADER => Ok(DataWord::TraceHeader(TraceHeader {
                id: SourceId::new(
                    ((word >> ADC_SFP_SHIFT) & ADC_SFP_MASK) as u8,
                    ((word >> ADC_BOARD_SHIFT) & ADC_BOARD_MASK) as u8,
                    ((word >> ADC_CHANNEL_SHIFT) & ADC_CHANNEL_MASK) as u8,
                ),
                samples: (word & TRACE_SAMPLES_MASK) as u16,
            })),
            _ => Ok(DataWord::Samples(word)),
        }
    }
}

/// Unpack the four 14-bit samples of a sample word into `out`.
pub fn unpack_samples(word: u64, out: &mut Vec<u16>) {
    for lane in 0..SAMPLES_PER_WORD {
        out.push(((word >> (lane as u32 * SAMPLE_LANE_BITS)) & SAMPLE_MASK) as u16);
    }
}

/// Word constructors used by the unit tests to synthesize streams.
#[cfg(test)]
pub(crate) mod encode {
    use super::*;

    pub fn adc_word(id: SourceId, lsb: u32, value: u16, pileup: bool, clip: bool) -> u64 {
        WORD_TYPE_ADC << WORD_TYPE_SHIFT
            | (pileup as u64) << ADC_PILEUP_SHIFT
            | (clip as u64) << ADC_CLIP_SHIFT
            | ((id.sfp as u64) & ADC_SFP_MASK) << ADC_SFP_SHIFT
            | ((id.board as u64) & ADC_BOARD_MASK) << ADC_BOARD_SHIFT
            | ((id.channel as u64) & ADC_CHANNEL_MASK) << ADC_CHANNEL_SHIFT
            | ((lsb as u64) & ADC_LSB_MASK) << ADC_LSB_SHIFT
            | (value as u64) & ADC_VALUE_MASK
    }

    pub fn info_word(id: SourceId, code: u8, field: u32) -> u64 {
        WORD_TYPE_INFO << WORD_TYPE_SHIFT
            | ((code as u64) & INFO_CODE_MASK) << INFO_CODE_SHIFT
            | ((id.sfp as u64) & INFO_SFP_MASK) << INFO_SFP_SHIFT
            | ((id.board as u64) & INFO_BOARD_MASK) << INFO_BOARD_SHIFT
            | ((id.channel as u64) & INFO_CHANNEL_MASK) << INFO_CHANNEL_SHIFT
            | (field as u64) & INFO_FIELD_MASK
    }

    pub fn trace_header(id: SourceId, samples: u16) -> u64 {
        WORD_TYPE_TRACE_HEADER << WORD_TYPE_SHIFT
            | ((id.sfp as u64) & ADC_SFP_MASK) << ADC_SFP_SHIFT
            | ((id.board as u64) & ADC_BOARD_MASK) << ADC_BOARD_SHIFT
            | ((id.channel as u64) & ADC_CHANNEL_MASK) << ADC_CHANNEL_SHIFT
            | (samples as u64) & TRACE_SAMPLES_MASK
    }

    pub fn sample_word(samples: [u16; 4]) -> u64 {
        let mut word = 0u64;
        for (lane, sample) in samples.iter().enumerate() {
            word |= ((*sample as u64) & SAMPLE_MASK) << (lane as u32 * SAMPLE_LANE_BITS);
        }
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adc_word_fields() {
        let id = SourceId::new(1, 7, 12);
        let word = encode::adc_word(id, 0x0ABCDEF, 4321, true, false);
        match DataWord::try_from(word) {
            Ok(DataWord::Adc(adc)) => {
                assert_eq!(adc.id, id);
                assert_eq!(adc.lsb, 0x0ABCDEF);
                assert_eq!(adc.value, 4321);
                assert!(adc.pileup);
                assert!(!adc.clip);
            }
            other => panic!("Expected an ADC word, got {other:?}"),
        }
    }

    #[test]
    fn test_info_word_fields() {
        let id = SourceId::new(2, 3, 4);
        let word = encode::info_word(id, INFO_CODE_TS_MSB, 0x00FF123);
        match DataWord::try_from(word) {
            Ok(DataWord::Info(info)) => {
                assert_eq!(info.id, id);
                assert_eq!(info.code, InfoCode::TimestampMsb);
                assert!(!info.code.is_pulse());
                assert_eq!(info.field, 0x00FF123);
            }
            other => panic!("Expected an info word, got {other:?}"),
        }
    }

    #[test]
    fn test_pulse_codes_are_pulses() {
        for code in [
            INFO_CODE_EBIS,
            INFO_CODE_SYNC,
            INFO_CODE_PAUSE,
            INFO_CODE_RESUME,
        ] {
            assert!(InfoCode::try_from(code).unwrap().is_pulse());
        }
        assert!(!InfoCode::try_from(INFO_CODE_TS_HSB).unwrap().is_pulse());
    }

    #[test]
    fn test_unknown_info_code_rejected() {
        let word = encode::info_word(SourceId::new(0, 0, 0), 0x7, 99);
        assert!(matches!(
            DataWord::try_from(word),
            Err(WordError::UnknownInfoCode(0x7))
        ));
    }

    #[test]
    fn test_trace_header_fields() {
        let id = SourceId::new(0, 5, 9);
        let word = encode::trace_header(id, 250);
        match DataWord::try_from(word) {
            Ok(DataWord::TraceHeader(header)) => {
                assert_eq!(header.id, id);
                assert_eq!(header.samples, 250);
            }
            other => panic!("Expected a trace header, got {other:?}"),
        }
    }

    #[test]
    fn test_sample_word_roundtrip() {
        let word = encode::sample_word([0x3FFF, 0, 517, 8000]);
        match DataWord::try_from(word) {
            Ok(DataWord::Samples(raw)) => {
                let mut samples = Vec::new();
                unpack_samples(raw, &mut samples);
                assert_eq!(samples, vec![0x3FFF, 0, 517, 8000]);
            }
            other => panic!("Expected a sample word, got {other:?}"),
        }
    }

    #[test]
    fn test_info_code_raw_values() {
        assert_eq!(InfoCode::EbisPulse.code(), INFO_CODE_EBIS);
        assert_eq!(InfoCode::TimestampHsb.code(), INFO_CODE_TS_HSB);
        assert_eq!(InfoCode::Resume.code(), INFO_CODE_RESUME);
    }
}
