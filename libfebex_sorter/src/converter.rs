use bit_set::BitSet;
use fxhash::FxHashMap;

use super::block::Block;
use super::calibration::EnergyCalibration;
use super::config::Config;
use super::data_word::{unpack_samples, AdcWord, DataWord, InfoCode, InfoWord, TraceHeader};
use super::ebis::EbisGate;
use super::error::{ConfigError, OrderingError, WordError};
use super::event::{EventPacket, PacketBody};
use super::hardware_id::{uuid_bound, SourceId};
use super::ordering::{EventOrderer, SortStrategy};
use super::timestamp::{AnomalyCounters, Fragment, TimestampCodec};

/// Per-board activity counters, keyed by the board id (channel zeroed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardDiagnostics {
    pub hits: u64,
    pub pauses: u64,
    pub resumes: u64,
    pub syncs: u64,
}

/// End-of-run diagnostic snapshot, logged and written alongside the data.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub counters: AnomalyCounters,
    pub dropped_late: u64,
    pub ebis_filtered: u64,
    pub unknown_words: u64,
    pub orphan_samples: u64,
    pub blocks: u64,
    pub channels: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub boards: Vec<(SourceId, BoardDiagnostics)>,
}

/// Converter takes raw blocks and produces time-ordered EventPackets.
///
/// The Converter receives blocks from the Merger and walks their words:
/// timestamp register words feed the codec, pulse words complete a group and
/// become stream markers, ADC words complete a group and become data packets
/// with calibrated energy, gate flag, and any pending trace. Finished packets
/// accumulate in the ordering buffer until drained to the HDFWriter.
#[derive(Debug)]
pub struct Converter {
    codec: TimestampCodec,
    gate: EbisGate,
    calibration: EnergyCalibration,
    orderer: EventOrderer,
    ebis_only: bool,
    write_traces: bool,
    trace_in_flight: Option<(SourceId, u16, Vec<u16>)>,
    pending_traces: FxHashMap<u64, Vec<u16>>,
    channels_seen: BitSet,
    board_stats: FxHashMap<SourceId, BoardDiagnostics>,
    unknown_words: u64,
    orphan_samples: u64,
    ebis_filtered: u64,
    blocks_processed: u64,
    first_timestamp: Option<i64>,
    last_timestamp: Option<i64>,
    drained_to: Option<i64>,
}

impl Converter {
    /// Create a new Converter for one run.
    ///
    /// Requires an EnergyCalibration; engine parameters come from the Config.
    pub fn new(config: &Config, calibration: EnergyCalibration) -> Result<Self, ConfigError> {
        Ok(Converter {
            codec: TimestampCodec::new(config.timestamp_layout, config.thresholds)?,
            gate: EbisGate::new(config.ebis)?,
            calibration,
            orderer: EventOrderer::new(config.sort_strategy),
            ebis_only: config.ebis_only,
            write_traces: config.write_traces,
            trace_in_flight: None,
            pending_traces: FxHashMap::default(),
            channels_seen: BitSet::with_capacity(uuid_bound()),
            board_stats: FxHashMap::default(),
            unknown_words: 0,
            orphan_samples: 0,
            ebis_filtered: 0,
            blocks_processed: 0,
            first_timestamp: None,
            last_timestamp: None,
            drained_to: None,
        })
    }

    pub fn strategy(&self) -> SortStrategy {
        self.orderer.strategy()
    }

    /// Walk every word of one block. Word-level problems are counted and
    /// skipped; nothing in a block payload aborts the run.
    pub fn process_block(&mut self, block: Block) {
        self.blocks_processed += 1;
        for word in &block.words {
            match self.handle_word(*word) {
                Ok(()) => {}
                Err(WordError::UnknownInfoCode(code)) => {
                    self.unknown_words += 1;
                    log::debug!("Skipping info word with unknown code 0x{code:x}");
                }
                Err(WordError::OrphanSamples(word)) => {
                    self.orphan_samples += 1;
                    log::debug!("Skipping orphaned sample word 0x{word:016x}");
                }
            }
        }
    }

    fn handle_word(&mut self, word: u64) -> Result<(), WordError> {
        match DataWord::try_from(word)? {
            DataWord::Adc(adc) => self.handle_adc(adc),
            DataWord::Info(info) => self.handle_info(info),
            DataWord::TraceHeader(header) => self.handle_trace_header(header),
            DataWord::Samples(raw) => return self.handle_samples(raw),
        }
        Ok(())
    }

    fn handle_adc(&mut self, adc: AdcWord) {
        let uuid = adc.id.uuid();
        // The pending trace belongs to this trigger whether or not the
        // group is accepted.
        let trace = self.pending_traces.remove(&uuid);
        let Some(timestamp) = self.codec.decode(Fragment::lsb(adc.id, adc.lsb)) else {
            return;
        };

        self.channels_seen.insert(uuid as usize);
        self.board_stats.entry(adc.id.board_id()).or_default().hits += 1;

        let beam_on = self.gate.is_beam_on(timestamp);
        if self.ebis_only && !beam_on {
            self.ebis_filtered += 1;
            return;
        }

        self.push(EventPacket {
            source: adc.id,
            timestamp,
            beam_on,
            body: PacketBody::Adc {
                value: adc.value,
                energy: self.calibration.energy(uuid, adc.value),
                pileup: adc.pileup,
                clip: adc.clip,
                trace,
            },
        });
    }

    fn handle_info(&mut self, info: InfoWord) {
        match info.code {
            InfoCode::TimestampMsb => {
                self.codec.decode(Fragment::msb(info.id, info.field));
            }
            InfoCode::TimestampHsb => {
                self.codec.decode(Fragment::hsb(info.id, info.field));
            }
            code => {
                let board_id = info.id.board_id();
                match code {
                    InfoCode::Pause => self.board_stats.entry(board_id).or_default().pauses += 1,
                    InfoCode::Resume => self.board_stats.entry(board_id).or_default().resumes += 1,
                    InfoCode::SyncPulse => self.board_stats.entry(board_id).or_default().syncs += 1,
                    _ => {}
                }
                let Some(timestamp) = self.codec.decode(Fragment::lsb(info.id, info.field))
                else {
                    return;
                };
                match code {
                    InfoCode::EbisPulse => {
                        // Re-anchor before evaluating the gate so the pulse
                        // itself sits at phase zero, outside the window.
                        self.gate.rebase(timestamp);
                        self.push(EventPacket {
                            source: info.id,
                            timestamp,
                            beam_on: self.gate.is_beam_on(timestamp),
                            body: PacketBody::EbisPulse,
                        });
                    }
                    InfoCode::SyncPulse => {
                        self.push(EventPacket {
                            source: info.id,
                            timestamp,
                            beam_on: self.gate.is_beam_on(timestamp),
                            body: PacketBody::SyncPulse,
                        });
                    }
                    // Pause/resume words keep the codec state fresh across
                    // dead time but are bookkeeping, not stream markers.
                    _ => {}
                }
            }
        }
    }

    fn handle_trace_header(&mut self, header: TraceHeader) {
        if let Some((id, _, _)) = self.trace_in_flight.take() {
            log::warn!("Discarding unfinished trace from {id}");
        }
        if header.samples == 0 {
            return;
        }
        self.trace_in_flight = Some((
            header.id,
            header.samples,
            Vec::with_capacity(header.samples as usize),
        ));
    }

    fn handle_samples(&mut self, raw: u64) -> Result<(), WordError> {
        let Some((_, expected, samples)) = &mut self.trace_in_flight else {
            return Err(WordError::OrphanSamples(raw));
        };
        unpack_samples(raw, samples);
        if samples.len() >= *expected as usize {
            samples.truncate(*expected as usize);
            let (id, _, samples) = self.trace_in_flight.take().unwrap();
            if self.write_traces && self.pending_traces.insert(id.uuid(), samples).is_some() {
                log::warn!("Discarding unclaimed trace from {id}");
            }
        }
        Ok(())
    }

    fn push(&mut self, packet: EventPacket) {
        self.first_timestamp = Some(match self.first_timestamp {
            Some(first) => first.min(packet.timestamp),
            None => packet.timestamp,
        });
        self.last_timestamp = Some(match self.last_timestamp {
            Some(last) => last.max(packet.timestamp),
            None => packet.timestamp,
        });
        self.orderer.push(packet);
    }

    /// Drain everything the codec can no longer reach backwards, keeping the
    /// buffer small on long runs. Map strategy only; called at block
    /// boundaries by the run processor.
    ///
    /// The codec low watermark regresses when a silent source first appears,
    /// so the drain point is clamped to never move backwards.
    pub fn drain_ready(&mut self) -> Result<Vec<EventPacket>, OrderingError> {
        let Some(watermark) = self.codec.low_watermark() else {
            return Ok(Vec::new());
        };
        let watermark = match self.drained_to {
            Some(previous) => watermark.max(previous),
            None => watermark,
        };
        let packets = self.orderer.drain_until(watermark)?;
        self.drained_to = Some(watermark);
        Ok(packets)
    }

    /// Drain the full remaining buffer in time order, at end of run.
    pub fn drain_all(&mut self) -> Vec<EventPacket> {
        self.orderer.drain()
    }

    /// Snapshot of the run diagnostics, boards sorted by hardware address.
    pub fn summary(&self) -> RunSummary {
        let mut boards: Vec<(SourceId, BoardDiagnostics)> = self
            .board_stats
            .iter()
            .map(|(id, stats)| (*id, *stats))
            .collect();
        boards.sort_by_key(|(id, _)| id.uuid());
        RunSummary {
            counters: self.codec.counters(),
            dropped_late: self.orderer.dropped_late(),
            ebis_filtered: self.ebis_filtered,
            unknown_words: self.unknown_words,
            orphan_samples: self.orphan_samples,
            blocks: self.blocks_processed,
            channels: self.channels_seen.len(),
            first_timestamp: self.first_timestamp,
            last_timestamp: self.last_timestamp,
            boards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{INFO_CODE_EBIS, INFO_CODE_PAUSE, INFO_CODE_SYNC, INFO_CODE_TS_MSB};
    use crate::data_word::encode;
    use crate::ebis::EbisParameters;
    use crate::timestamp::{Thresholds, TimestampLayout};

    const A: SourceId = SourceId {
        sfp: 0,
        board: 1,
        channel: 2,
    };
    const B: SourceId = SourceId {
        sfp: 0,
        board: 3,
        channel: 0,
    };
    const C: SourceId = SourceId {
        sfp: 1,
        board: 2,
        channel: 4,
    };
    const E: SourceId = SourceId {
        sfp: 0,
        board: 0,
        channel: 15,
    };

    fn test_config(strategy: SortStrategy) -> Config {
        Config {
            sort_strategy: strategy,
            timestamp_layout: TimestampLayout {
                lsb_bits: 8,
                msb_bits: 8,
                hsb_bits: 0,
            },
            thresholds: Thresholds {
                jump_threshold: 1 << 14,
                warp_tolerance: 256,
            },
            ebis: EbisParameters {
                period: 8192,
                reference_phase: 0,
                window: 1024,
            },
            ..Default::default()
        }
    }

    fn converter(config: &Config) -> Converter {
        Converter::new(config, EnergyCalibration::new(None).unwrap()).unwrap()
    }

    fn block(words: Vec<u64>) -> Block {
        Block {
            sequence: 0,
            sfp: 0,
            words,
        }
    }

    /// Mixed block: register words, pulses, traces, a bad word, a mashed
    /// group, and a register wrap.
    fn mixed_words() -> Vec<u64> {
        vec![
            encode::info_word(A, INFO_CODE_TS_MSB, 2),
            encode::adc_word(A, 100, 1000, false, false), // ts 612
            encode::info_word(E, INFO_CODE_EBIS, 150),    // ts 150, re-anchors gate
            encode::adc_word(A, 120, 2000, true, false),  // ts 632
            encode::trace_header(A, 6),
            encode::sample_word([1, 2, 3, 4]),
            encode::sample_word([5, 6, 0, 0]),
            encode::adc_word(A, 140, 100, false, true), // ts 652, takes the trace
            encode::adc_word(B, 40, 500, false, false), // ts 40
            encode::info_word(A, INFO_CODE_SYNC, 160),  // ts 672
            encode::info_word(B, INFO_CODE_PAUSE, 50),  // ts 50, no packet
            encode::adc_word(B, 60, 700, false, false), // ts 60
            encode::info_word(A, 0x7, 99),              // unknown code, skipped
            encode::info_word(A, INFO_CODE_TS_MSB, 1),  // stale register
            encode::adc_word(A, 10, 50, false, false),  // mash, dropped
            encode::trace_header(A, 2),
            encode::sample_word([9, 9, 0, 0]),
            encode::info_word(A, INFO_CODE_TS_MSB, 2),
            encode::adc_word(A, 200, 300, false, false), // ts 712, takes the trace
            // C walks its MSB register through the wrap: 254, 255, 0, 1
            encode::info_word(C, INFO_CODE_TS_MSB, 254),
            encode::adc_word(C, 10, 11, false, false), // ts 65034
            encode::info_word(C, INFO_CODE_TS_MSB, 255),
            encode::adc_word(C, 20, 12, false, false), // ts 65300
            encode::info_word(C, INFO_CODE_TS_MSB, 0),
            encode::adc_word(C, 30, 13, false, false), // ts 65566, epoch 1
            encode::info_word(C, INFO_CODE_TS_MSB, 1),
            encode::adc_word(C, 40, 14, false, false), // ts 65832
        ]
    }

    fn timestamps(packets: &[EventPacket]) -> Vec<i64> {
        packets.iter().map(|packet| packet.timestamp).collect()
    }

    #[test]
    fn test_block_to_ordered_stream() {
        let config = test_config(SortStrategy::Map);
        let mut converter = converter(&config);
        converter.process_block(block(mixed_words()));
        let drained = converter.drain_all();

        assert_eq!(
            timestamps(&drained),
            vec![40, 60, 150, 612, 632, 652, 672, 712, 65034, 65300, 65566, 65832]
        );
        // The EBIS pulse itself sits at phase zero, outside its own window
        assert!(!drained[2].beam_on);
        assert_eq!(drained[2].body, PacketBody::EbisPulse);
        // B fires outside the gate, A inside
        assert!(!drained[0].beam_on);
        assert!(drained[3].beam_on);
        assert_eq!(drained[6].body, PacketBody::SyncPulse);

        match &drained[5].body {
            PacketBody::Adc { trace, clip, .. } => {
                assert_eq!(trace.as_deref(), Some(&[1, 2, 3, 4, 5, 6][..]));
                assert!(*clip);
            }
            other => panic!("Expected a traced ADC packet, got {other:?}"),
        }
        match &drained[7].body {
            PacketBody::Adc { trace, .. } => {
                assert_eq!(trace.as_deref(), Some(&[9, 9][..]));
            }
            other => panic!("Expected a traced ADC packet, got {other:?}"),
        }

        let summary = converter.summary();
        assert_eq!(summary.counters.data, 14);
        assert_eq!(summary.counters.mash, 1);
        assert_eq!(summary.counters.reject, 1);
        assert_eq!(summary.counters.normal(), 13);
        // The register wrap lands in the next epoch without anomalies
        assert_eq!(summary.counters.jump, 0);
        assert_eq!(summary.counters.warp, 0);
        assert_eq!(summary.unknown_words, 1);
        assert_eq!(summary.orphan_samples, 0);
        assert_eq!(summary.channels, 3);
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.first_timestamp, Some(40));
        assert_eq!(summary.last_timestamp, Some(65832));

        let a_board = summary
            .boards
            .iter()
            .find(|(id, _)| *id == A.board_id())
            .map(|(_, stats)| *stats)
            .unwrap();
        assert_eq!(a_board.hits, 4);
        assert_eq!(a_board.syncs, 1);
        let b_board = summary
            .boards
            .iter()
            .find(|(id, _)| *id == B.board_id())
            .map(|(_, stats)| *stats)
            .unwrap();
        assert_eq!(b_board.hits, 2);
        assert_eq!(b_board.pauses, 1);
        let c_board = summary
            .boards
            .iter()
            .find(|(id, _)| *id == C.board_id())
            .map(|(_, stats)| *stats)
            .unwrap();
        assert_eq!(c_board.hits, 4);
    }

    #[test]
    fn test_strategies_agree_end_to_end() {
        let mut by_vector = converter(&test_config(SortStrategy::Vector));
        let mut by_map = converter(&test_config(SortStrategy::Map));
        by_vector.process_block(block(mixed_words()));
        by_map.process_block(block(mixed_words()));
        assert_eq!(by_vector.drain_all(), by_map.drain_all());
    }

    #[test]
    fn test_ebis_only_filters_data_packets() {
        let mut config = test_config(SortStrategy::Map);
        config.ebis_only = true;
        let mut converter = converter(&config);
        converter.process_block(block(mixed_words()));
        let drained = converter.drain_all();

        // B's hits and C's first three fall outside the gate; pulses are
        // always kept
        assert_eq!(
            timestamps(&drained),
            vec![150, 612, 632, 652, 672, 712, 65832]
        );
        let summary = converter.summary();
        assert_eq!(summary.ebis_filtered, 5);
        // Filtered hits still count as board activity
        assert_eq!(summary.channels, 3);
    }

    #[test]
    fn test_incremental_drains_follow_watermark() {
        let config = test_config(SortStrategy::Map);
        let mut converter = converter(&config);
        converter.process_block(block(vec![
            encode::info_word(A, INFO_CODE_TS_MSB, 1),
            encode::info_word(B, INFO_CODE_TS_MSB, 1),
            encode::adc_word(A, 10, 1, false, false), // ts 266
            encode::adc_word(B, 5, 2, false, false),  // ts 261
            encode::adc_word(A, 50, 3, false, false), // ts 306
            encode::adc_word(B, 80, 4, false, false), // ts 336
        ]));
        // Watermark: min(306, 336) - 256 = 50; nothing is below it yet
        assert!(converter.drain_ready().unwrap().is_empty());

        converter.process_block(block(vec![
            encode::info_word(A, INFO_CODE_TS_MSB, 2),
            encode::info_word(B, INFO_CODE_TS_MSB, 2),
            encode::adc_word(A, 10, 5, false, false), // ts 522
            encode::adc_word(B, 20, 6, false, false), // ts 532
        ]));
        // Watermark rises to min(522, 532) - 256 = 266, releasing ts 261
        assert_eq!(timestamps(&converter.drain_ready().unwrap()), vec![261]);
        assert_eq!(
            timestamps(&converter.drain_all()),
            vec![266, 306, 336, 522, 532]
        );
        assert_eq!(converter.summary().dropped_late, 0);
    }

    #[test]
    fn test_rejected_group_discards_its_trace() {
        let config = test_config(SortStrategy::Map);
        let mut converter = converter(&config);
        converter.process_block(block(vec![
            encode::info_word(A, INFO_CODE_TS_MSB, 2),
            encode::adc_word(A, 100, 1, false, false), // ts 612
            encode::trace_header(A, 2),
            encode::sample_word([7, 7, 0, 0]),
            encode::info_word(A, INFO_CODE_TS_MSB, 1), // stale register
            encode::adc_word(A, 10, 2, false, false),  // mash, trace dropped
            encode::info_word(A, INFO_CODE_TS_MSB, 2),
            encode::adc_word(A, 150, 3, false, false), // ts 662
        ]));
        let drained = converter.drain_all();
        assert_eq!(timestamps(&drained), vec![612, 662]);
        assert!(drained.iter().all(|packet| !packet.has_trace()));
        assert_eq!(converter.summary().counters.mash, 1);
    }

    #[test]
    fn test_orphan_samples_are_counted() {
        let config = test_config(SortStrategy::Map);
        let mut converter = converter(&config);
        converter.process_block(block(vec![encode::sample_word([1, 2, 3, 4])]));
        assert_eq!(converter.summary().orphan_samples, 1);
        assert!(converter.drain_all().is_empty());
    }

    #[test]
    fn test_traces_can_be_disabled() {
        let mut config = test_config(SortStrategy::Map);
        config.write_traces = false;
        let mut converter = converter(&config);
        converter.process_block(block(vec![
            encode::info_word(A, INFO_CODE_TS_MSB, 2),
            encode::trace_header(A, 2),
            encode::sample_word([7, 7, 0, 0]),
            encode::adc_word(A, 100, 1, false, false),
        ]));
        let drained = converter.drain_all();
        assert_eq!(drained.len(), 1);
        assert!(!drained[0].has_trace());
        // The sample words were consumed by the header, not orphaned
        assert_eq!(converter.summary().orphan_samples, 0);
    }
}
