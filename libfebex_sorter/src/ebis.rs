//! EBIS beam gate evaluation.
//!
//! The EBIS source fires on a fixed period, announced to the DAQ as an info
//! word on a dedicated channel. Events are tagged by where their timestamp
//! falls in that cycle so that beam-on data can be selected offline (or
//! online with the `ebis_only` switch). The gate is purely arithmetic; it
//! never mutates decoder state.

use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_EBIS_WINDOW, TIMESTAMP_CLOCK_HZ};
use super::error::ConfigError;

/// EBIS cycle description, in clock ticks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EbisParameters {
    /// Ticks between EBIS pulses. Zero disables the gate entirely.
    pub period: i64,
    /// Timestamp of a known pulse, seeding the gate anchor before the first
    /// pulse word is seen in the data.
    pub reference_phase: i64,
    /// Width of the beam-on window following each pulse.
    pub window: i64,
}

impl Default for EbisParameters {
    fn default() -> Self {
        EbisParameters {
            // One pulse per second at the FEBEX clock until a real period
            // is configured or learned from the data stream.
            period: TIMESTAMP_CLOCK_HZ as i64,
            reference_phase: 0,
            window: DEFAULT_EBIS_WINDOW,
        }
    }
}

impl EbisParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period < 0 {
            return Err(ConfigError::InvalidEbisPeriod(self.period));
        }
        if self.window < 0 {
            return Err(ConfigError::InvalidEbisWindow(self.window));
        }
        if self.period > 0 && (self.window == 0 || self.window >= self.period) {
            return Err(ConfigError::InvalidEbisWindow(self.window));
        }
        Ok(())
    }
}

/// Phase gate over the EBIS cycle.
///
/// The anchor is the timestamp of a known pulse; any pulse works since the
/// phase is taken modulo the period. Re-anchoring on each decoded pulse word
/// keeps the gate honest against slow drift of the source clock.
#[derive(Debug, Clone, Copy)]
pub struct EbisGate {
    parameters: EbisParameters,
    anchor: i64,
}

impl EbisGate {
    pub fn new(parameters: EbisParameters) -> Result<Self, ConfigError> {
        parameters.validate()?;
        Ok(EbisGate {
            parameters,
            anchor: parameters.reference_phase,
        })
    }

    /// Move the anchor to a freshly observed pulse timestamp.
    pub fn rebase(&mut self, pulse_timestamp: i64) {
        self.anchor = pulse_timestamp;
    }

    /// True when the timestamp falls strictly inside the beam-on window.
    ///
    /// The pulse instant itself (phase zero) is excluded; the pulse word is
    /// bookkeeping, not beam. Timestamps before the anchor fold into the
    /// cycle like any other, so a late anchor does not blind the gate.
    pub fn is_beam_on(&self, timestamp: i64) -> bool {
        if self.parameters.period == 0 {
            return false;
        }
        let period = self.parameters.period;
        let phase = ((timestamp - self.anchor) % period + period) % period;
        phase > 0 && phase < self.parameters.window
    }

    pub fn parameters(&self) -> EbisParameters {
        self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(period: i64, window: i64) -> EbisGate {
        EbisGate::new(EbisParameters {
            period,
            reference_phase: 0,
            window,
        })
        .unwrap()
    }

    #[test]
    fn test_window_boundaries() {
        let gate = gate(100, 40);
        assert!(!gate.is_beam_on(0));
        assert!(gate.is_beam_on(1));
        assert!(gate.is_beam_on(39));
        assert!(!gate.is_beam_on(40));
        assert!(!gate.is_beam_on(99));
        assert!(!gate.is_beam_on(100));
        assert!(gate.is_beam_on(101));
    }

    #[test]
    fn test_timestamps_before_anchor_fold_into_cycle() {
        let mut gate = gate(100, 40);
        gate.rebase(500);
        assert!(gate.is_beam_on(520));
        assert!(!gate.is_beam_on(560));
        // 430 is 70 ticks before the anchor, phase 30
        assert!(gate.is_beam_on(430));
        assert!(!gate.is_beam_on(440));
    }

    #[test]
    fn test_zero_period_disables_gate() {
        let gate = EbisGate::new(EbisParameters {
            period: 0,
            reference_phase: 0,
            window: 40,
        })
        .unwrap();
        assert!(!gate.is_beam_on(0));
        assert!(!gate.is_beam_on(17));
        assert!(!gate.is_beam_on(-3));
    }

    #[test]
    fn test_reference_phase_seeds_anchor() {
        let gate = EbisGate::new(EbisParameters {
            period: 100,
            reference_phase: 50,
            window: 40,
        })
        .unwrap();
        assert!(!gate.is_beam_on(20));
        assert!(gate.is_beam_on(70));
    }

    #[test]
    fn test_rebase_shifts_phase() {
        let mut gate = gate(100, 40);
        assert!(gate.is_beam_on(20));
        gate.rebase(50);
        assert!(!gate.is_beam_on(20));
        assert!(gate.is_beam_on(70));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(
            EbisGate::new(EbisParameters {
                period: -5,
                reference_phase: 0,
                window: 1
            }),
            Err(ConfigError::InvalidEbisPeriod(-5))
        ));
        assert!(matches!(
            EbisGate::new(EbisParameters {
                period: 100,
                reference_phase: 0,
                window: 0
            }),
            Err(ConfigError::InvalidEbisWindow(0))
        ));
        assert!(matches!(
            EbisGate::new(EbisParameters {
                period: 100,
                reference_phase: 0,
                window: 100
            }),
            Err(ConfigError::InvalidEbisWindow(100))
        ));
        // A disabled gate still rejects a negative window
        assert!(matches!(
            EbisGate::new(EbisParameters {
                period: 0,
                reference_phase: 0,
                window: -4_000_000
            }),
            Err(ConfigError::InvalidEbisWindow(-4_000_000))
        ));
    }
}
