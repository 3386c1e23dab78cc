//! Timestamp reconstruction for the FEBEX front end.
//!
//! Each channel latches only the low bits of the 100 MHz clock into its data
//! words; the middle and high registers arrive separately as info words. The
//! [`TimestampCodec`] stitches the register fragments of every source back
//! into full-width timestamps, absorbs register wrap-around with a per-source
//! epoch counter, and classifies each completed group against the source's
//! last good timestamp: normal, jump (large forward gap, accepted), warp
//! (small backward step from a fragment race, repaired when possible), or
//! mash (unrecoverable corruption, dropped).

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_HSB_BITS, DEFAULT_JUMP_THRESHOLD, DEFAULT_LSB_BITS, DEFAULT_MSB_BITS,
    DEFAULT_WARP_TOLERANCE, MAX_LAYOUT_BITS,
};
use super::error::ConfigError;
use super::hardware_id::SourceId;

/// Which hardware register a fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentRole {
    /// Low bits, latched into every data word. Completes a group.
    Lsb,
    /// Middle register, broadcast as an info word when the LSB wraps.
    Msb,
    /// High register, broadcast as an info word when the MSB wraps.
    Hsb,
}

/// One hardware register word contributing part of a multi-word timestamp.
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub source: SourceId,
    pub role: FragmentRole,
    pub value: u32,
}

impl Fragment {
    pub fn lsb(source: SourceId, value: u32) -> Self {
        Fragment {
            source,
            role: FragmentRole::Lsb,
            value,
        }
    }

    pub fn msb(source: SourceId, value: u32) -> Self {
        Fragment {
            source,
            role: FragmentRole::Msb,
            value,
        }
    }

    pub fn hsb(source: SourceId, value: u32) -> Self {
        Fragment {
            source,
            role: FragmentRole::Hsb,
            value,
        }
    }
}

/// How the reconstructed timestamp is split across the hardware registers.
///
/// The widths are fixed by the firmware build, not inferred from data. The
/// default is the FEBEX layout: a 28-bit LSB in each data word plus 20-bit
/// MSB and 12-bit HSB broadcast registers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimestampLayout {
    pub lsb_bits: u32,
    pub msb_bits: u32,
    pub hsb_bits: u32,
}

impl Default for TimestampLayout {
    fn default() -> Self {
        TimestampLayout {
            lsb_bits: DEFAULT_LSB_BITS,
            msb_bits: DEFAULT_MSB_BITS,
            hsb_bits: DEFAULT_HSB_BITS,
        }
    }
}

impl TimestampLayout {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lsb_bits == 0 {
            return Err(ConfigError::LayoutZeroLsb);
        }
        if self.total_bits() > MAX_LAYOUT_BITS {
            return Err(ConfigError::LayoutTooWide(self.total_bits()));
        }
        Ok(())
    }

    pub fn total_bits(&self) -> u32 {
        self.lsb_bits + self.msb_bits + self.hsb_bits
    }

    /// Ticks covered by the full register width; one epoch step.
    pub fn span(&self) -> i64 {
        1i64 << self.total_bits()
    }

    /// Ticks covered by the LSB register alone; one MSB step.
    pub fn lsb_span(&self) -> i64 {
        1i64 << self.lsb_bits
    }

    fn mask(bits: u32) -> u64 {
        (1u64 << bits) - 1
    }

    fn compose(&self, epoch: i64, hsb: u64, msb: u64, lsb: u64) -> i64 {
        let registers =
            (hsb << (self.lsb_bits + self.msb_bits)) | (msb << self.lsb_bits) | lsb;
        (epoch << self.total_bits()) + registers as i64
    }

    /// The register whose wrap-around rolls the epoch over.
    fn top_role(&self) -> FragmentRole {
        if self.hsb_bits > 0 {
            FragmentRole::Hsb
        } else {
            FragmentRole::Msb
        }
    }
}

/// Anomaly thresholds for the classifier, in clock ticks.
///
/// The defaults are derived from the 100 MHz clock and the default register
/// layout rather than from any particular beam structure; experiments with
/// other clocks should scale them in the run configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    /// Forward delta at or above which an accepted group counts as a jump.
    pub jump_threshold: i64,
    /// Largest backward delta still treated as a repairable fragment race.
    pub warp_tolerance: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            jump_threshold: DEFAULT_JUMP_THRESHOLD,
            warp_tolerance: DEFAULT_WARP_TOLERANCE,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jump_threshold <= 0 {
            return Err(ConfigError::InvalidJumpThreshold(self.jump_threshold));
        }
        if self.warp_tolerance <= 0 || self.warp_tolerance >= self.jump_threshold {
            return Err(ConfigError::InvalidWarpTolerance(
                self.warp_tolerance,
                self.jump_threshold,
            ));
        }
        Ok(())
    }
}

/// Running totals of classified fragment groups. Never reset mid-run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnomalyCounters {
    /// Completed groups attempted, accepted or not.
    pub data: u64,
    /// Accepted groups with an unusually large forward delta.
    pub jump: u64,
    /// Small backward steps from fragment races, repaired or not.
    pub warp: u64,
    /// Unrecoverable groups with a large backward delta.
    pub mash: u64,
    /// Dropped groups: every mash plus every failed warp repair.
    pub reject: u64,
}

impl AnomalyCounters {
    /// Groups accepted without any anomaly flag.
    pub fn normal(&self) -> u64 {
        self.data - self.jump - self.warp - self.mash
    }

    /// Groups that produced a timestamp.
    pub fn accepted(&self) -> u64 {
        self.data - self.reject
    }
}

/// Per-source decode state. Lives for one run; a fresh codec starts over.
#[derive(Debug, Clone, Copy, Default)]
struct SourceState {
    last_good: i64,
    msb: u64,
    hsb: u64,
    epoch: i64,
    first_seen: bool,
    rollover_pending: bool,
}

/// Reassembles full timestamps from register fragments, one state per source.
///
/// Register fragments (MSB/HSB) update the source's registers and return
/// nothing; an LSB fragment completes a group, which is composed, checked
/// for a pending rollover, and classified. Only accepted groups advance
/// `last_good`, so one corrupt word cannot poison later comparisons.
#[derive(Debug)]
pub struct TimestampCodec {
    layout: TimestampLayout,
    thresholds: Thresholds,
    states: FxHashMap<u64, SourceState>,
    counters: AnomalyCounters,
}

impl TimestampCodec {
    pub fn new(layout: TimestampLayout, thresholds: Thresholds) -> Result<Self, ConfigError> {
        layout.validate()?;
        thresholds.validate()?;
        Ok(TimestampCodec {
            layout,
            thresholds,
            states: FxHashMap::default(),
            counters: AnomalyCounters::default(),
        })
    }

    /// Feed one fragment; returns the reconstructed timestamp when the
    /// fragment completes a group and the group is accepted.
    pub fn decode(&mut self, fragment: Fragment) -> Option<i64> {
        let top_role = self.layout.top_role();
        let state = self.states.entry(fragment.source.uuid()).or_default();
        match fragment.role {
            FragmentRole::Msb => {
                let value = fragment.value as u64 & TimestampLayout::mask(self.layout.msb_bits);
                if fragment.role == top_role && state.first_seen && value < state.msb {
                    // A backward top register is either a wrap or a stale
                    // word; the next completed group decides which.
                    state.rollover_pending = true;
                }
                state.msb = value;
                None
            }
            FragmentRole::Hsb => {
                let value = fragment.value as u64 & TimestampLayout::mask(self.layout.hsb_bits);
                if fragment.role == top_role && state.first_seen && value < state.hsb {
                    state.rollover_pending = true;
                }
                state.hsb = value;
                None
            }
            FragmentRole::Lsb => {
                let lsb = fragment.value as u64 & TimestampLayout::mask(self.layout.lsb_bits);
                self.counters.data += 1;
                let mut candidate = self.layout.compose(state.epoch, state.hsb, state.msb, lsb);

                if !state.first_seen {
                    state.first_seen = true;
                    state.rollover_pending = false;
                    state.last_good = candidate;
                    return Some(candidate);
                }

                if state.rollover_pending {
                    state.rollover_pending = false;
                    if state.last_good - candidate > self.layout.span() / 2 {
                        state.epoch += 1;
                        candidate += self.layout.span();
                        log::debug!(
                            "Timestamp register wrap on {}; now in epoch {}",
                            fragment.source,
                            state.epoch
                        );
                    }
                }

                let delta = candidate - state.last_good;
                if delta >= self.thresholds.jump_threshold {
                    self.counters.jump += 1;
                    state.last_good = candidate;
                    Some(candidate)
                } else if delta >= 0 {
                    state.last_good = candidate;
                    Some(candidate)
                } else if -delta <= self.thresholds.warp_tolerance {
                    // The LSB wrapped before its MSB broadcast arrived;
                    // re-pair the group with the successor MSB value.
                    self.counters.warp += 1;
                    let repaired = candidate + self.layout.lsb_span();
                    let repaired_delta = repaired - state.last_good;
                    if (0..self.thresholds.jump_threshold).contains(&repaired_delta) {
                        state.last_good = repaired;
                        Some(repaired)
                    } else {
                        self.counters.reject += 1;
                        None
                    }
                } else {
                    self.counters.mash += 1;
                    self.counters.reject += 1;
                    log::debug!(
                        "Mashed fragment group on {}: candidate {} behind last good {}",
                        fragment.source,
                        candidate,
                        state.last_good
                    );
                    None
                }
            }
        }
    }

    /// Read-only snapshot of the anomaly counters.
    pub fn counters(&self) -> AnomalyCounters {
        self.counters
    }

    /// Timestamp below which no source can still produce an accepted group.
    ///
    /// Every source's next accepted timestamp is at least its `last_good`
    /// minus the warp tolerance, so the minimum over sources bounds what may
    /// yet enter the ordering buffer. None until a first group is accepted.
    pub fn low_watermark(&self) -> Option<i64> {
        self.states
            .values()
            .filter(|state| state.first_seen)
            .map(|state| state.last_good)
            .min()
            .map(|timestamp| timestamp - self.thresholds.warp_tolerance)
    }
}
