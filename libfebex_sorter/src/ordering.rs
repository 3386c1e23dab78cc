//! Time-ordering of decoded packets.
//!
//! Packets arrive interleaved across SFPs and boards with no cross-module
//! order guarantee. The [`EventOrderer`] buffers them and emits them in
//! non-decreasing timestamp order, with arrival order breaking ties so the
//! output is reproducible at coarse clock resolution. Two strategies cover
//! the two run modes: `vector` buffers the whole run and sorts once,
//! `map` keeps the buffer sorted on insert so it can be partially drained at
//! block boundaries and keep memory bounded on long runs. Both produce the
//! identical sequence for the same input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::OrderingError;
use super::event::EventPacket;

/// Buffering strategy for the run, chosen in the run configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortStrategy {
    /// Sort the whole buffer once at end of run.
    Vector,
    /// Keep the buffer sorted on insert; supports partial drains.
    #[default]
    Map,
}

#[derive(Debug)]
enum Buffer {
    Vector(Vec<(u64, EventPacket)>),
    Map(BTreeMap<(i64, u64), EventPacket>),
}

impl Buffer {
    fn new(strategy: SortStrategy) -> Self {
        match strategy {
            SortStrategy::Vector => Buffer::Vector(Vec::new()),
            SortStrategy::Map => Buffer::Map(BTreeMap::new()),
        }
    }
}

/// Accumulates decoded packets and yields them in `(timestamp, arrival)`
/// order.
///
/// Sequence numbers are assigned at push and are monotonic for the life of
/// the orderer, across drains, so tie-breaking stays stable over partial
/// flushes. Once output has been emitted up to some timestamp, a packet
/// pushed below that bound can no longer be placed; it is dropped and
/// counted rather than emitted out of order.
#[derive(Debug)]
pub struct EventOrderer {
    buffer: Buffer,
    next_sequence: u64,
    emitted_bound: Option<i64>,
    dropped_late: u64,
}

impl EventOrderer {
    pub fn new(strategy: SortStrategy) -> Self {
        EventOrderer {
            buffer: Buffer::new(strategy),
            next_sequence: 0,
            emitted_bound: None,
            dropped_late: 0,
        }
    }

    pub fn strategy(&self) -> SortStrategy {
        match self.buffer {
            Buffer::Vector(_) => SortStrategy::Vector,
            Buffer::Map(_) => SortStrategy::Map,
        }
    }

    pub fn len(&self) -> usize {
        match &self.buffer {
            Buffer::Vector(packets) => packets.len(),
            Buffer::Map(packets) => packets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packets dropped because they arrived below the emitted bound.
    pub fn dropped_late(&self) -> u64 {
        self.dropped_late
    }

    pub fn push(&mut self, packet: EventPacket) {
        if let Some(bound) = self.emitted_bound {
            if packet.timestamp < bound {
                self.dropped_late += 1;
                log::warn!(
                    "Dropping late packet from {} at {} (output already emitted through {})",
                    packet.source,
                    packet.timestamp,
                    bound
                );
                return;
            }
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        match &mut self.buffer {
            Buffer::Vector(packets) => packets.push((sequence, packet)),
            Buffer::Map(packets) => {
                packets.insert((packet.timestamp, sequence), packet);
            }
        }
    }

    /// Empty the buffer in sorted order. An empty buffer yields an empty
    /// vector.
    pub fn drain(&mut self) -> Vec<EventPacket> {
        let emitted: Vec<EventPacket> = match &mut self.buffer {
            Buffer::Vector(packets) => {
                let mut packets = std::mem::take(packets);
                packets.sort_by(|(seq_a, a), (seq_b, b)| {
                    (a.timestamp, *seq_a).cmp(&(b.timestamp, *seq_b))
                });
                packets.into_iter().map(|(_, packet)| packet).collect()
            }
            Buffer::Map(packets) => std::mem::take(packets).into_values().collect(),
        };
        if let Some(last) = emitted.last() {
            self.emitted_bound = Some(
                self.emitted_bound
                    .map_or(last.timestamp, |bound| bound.max(last.timestamp)),
            );
        }
        emitted
    }

    /// Emit everything strictly below `watermark`, leaving the rest buffered.
    ///
    /// Map strategy only; the vector buffer is unsorted until its one final
    /// drain. The watermark must not regress across calls, since everything
    /// below a previous watermark has already been emitted.
    pub fn drain_until(&mut self, watermark: i64) -> Result<Vec<EventPacket>, OrderingError> {
        let packets = match &mut self.buffer {
            Buffer::Vector(_) => return Err(OrderingError::PartialDrainUnsupported),
            Buffer::Map(packets) => packets,
        };
        if let Some(bound) = self.emitted_bound {
            if watermark < bound {
                return Err(OrderingError::WatermarkRegression(watermark, bound));
            }
        }
        let remainder = packets.split_off(&(watermark, 0));
        let emitted: Vec<EventPacket> =
            std::mem::replace(packets, remainder).into_values().collect();
        self.emitted_bound = Some(watermark);
        Ok(emitted)
    }
}
