use hdf5::types::VarLenUnicode;
use hdf5::{File, H5Type};
use ndarray::Array1;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::constants::TIMESTAMP_CLOCK_HZ;
use super::converter::RunSummary;
use super::error::HDF5WriterError;
use super::event::{EventPacket, PacketBody};
use super::merger::Merger;

const EVENTS_NAME: &str = "events";
const TRACES_NAME: &str = "traces";

// All event counters start from 0 by law
const START_EVENT_NUMBER: u64 = 0;
/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

/// One row of the ordered output stream, written as an HDF5 compound type.
///
/// Pulse rows (kind 1 and 2) carry zeroed ADC fields; traced rows have a
/// matching `event_{id}` dataset in the traces group.
#[derive(Debug, Clone, Copy, H5Type)]
#[repr(C)]
pub struct EventRow {
    pub id: u64,
    pub timestamp: i64,
    pub sfp: u8,
    pub board: u8,
    pub channel: u8,
    /// 0 = ADC hit, 1 = EBIS pulse, 2 = SYNC pulse.
    pub kind: u8,
    pub value: u16,
    pub energy: f64,
    pub pileup: u8,
    pub clip: u8,
    pub beam_on: u8,
    pub traced: u8,
}

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file for writing ordered event chunks. Each drain of the
/// ordering buffer becomes one `chunk_N` dataset; concatenating the chunks
/// in order reproduces the full time-ordered stream.
#[allow(dead_code)]
#[derive(Debug)]
pub struct HDFWriter {
    file_handle: File,
    parent_file_path: PathBuf,
    events_group: hdf5::Group,
    traces_group: hdf5::Group,
    next_event_id: u64,
    chunk_counter: u64,
    first_timestamp: Option<i64>,
    last_timestamp: i64,
    run_start: i64,
}
// Structure
// run_0001.h5
// events - min_event, max_event, first_timestamp, last_timestamp, run_start,
//          run_stop, version, anomaly counters
// |---- chunk_#(dset) - compound EventRow, one per drain
// traces
// |---- event_#(dset) - u16 samples, one per traced event

impl HDFWriter {
    /// Create the writer, opening a file at path and creating the data groups
    pub fn new(path: &Path) -> Result<Self, HDF5WriterError> {
        let file_handle = File::create(path)?;
        let stem = path.parent().unwrap();
        let run_path = path.file_stem().unwrap();
        let parent_file_path = stem.join(format!("{}.yml", run_path.to_string_lossy()));

        let sorter_version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);

        let events_group = file_handle.create_group(EVENTS_NAME)?;
        events_group.new_attr::<u64>().create("min_event")?;
        events_group.new_attr::<u64>().create("max_event")?;
        events_group.new_attr::<i64>().create("first_timestamp")?;
        events_group.new_attr::<i64>().create("last_timestamp")?;
        events_group.new_attr::<i64>().create("run_start")?;
        events_group.new_attr::<i64>().create("run_stop")?;
        for name in [
            "data_groups",
            "jumps",
            "warps",
            "mashes",
            "rejects",
            "dropped_late",
            "ebis_filtered",
        ] {
            events_group.new_attr::<u64>().create(name)?;
        }
        events_group
            .new_attr::<VarLenUnicode>()
            .create("version")?;
        events_group
            .attr("version")?
            .write_scalar(&VarLenUnicode::from_str(&sorter_version).unwrap())?;

        let traces_group = file_handle.create_group(TRACES_NAME)?;

        Ok(Self {
            file_handle,
            parent_file_path,
            events_group,
            traces_group,
            next_event_id: START_EVENT_NUMBER,
            chunk_counter: 0,
            first_timestamp: None,
            last_timestamp: 0,
            run_start: time::OffsetDateTime::now_utc().unix_timestamp(),
        })
    }

    /// Write one drained chunk of ordered packets, assigning global event ids.
    ///
    /// An empty drain writes nothing, so chunk numbering stays dense.
    pub fn write_events(&mut self, packets: Vec<EventPacket>) -> Result<(), HDF5WriterError> {
        if packets.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(packets.len());
        for packet in packets {
            let id = self.next_event_id;
            self.next_event_id += 1;
            if self.first_timestamp.is_none() {
                self.first_timestamp = Some(packet.timestamp);
            }
            self.last_timestamp = packet.timestamp;

            let kind = packet.body.kind_code();
            let (value, energy, pileup, clip, trace) = match packet.body {
                PacketBody::Adc {
                    value,
                    energy,
                    pileup,
                    clip,
                    trace,
                } => (value, energy, pileup, clip, trace),
                PacketBody::EbisPulse | PacketBody::SyncPulse => (0, 0.0, false, false, None),
            };
            let traced = trace.is_some();
            if let Some(trace) = trace {
                let data = Array1::from(trace);
                self.traces_group
                    .new_dataset_builder()
                    .with_data(&data)
                    .create(format!("event_{id}").as_str())?;
            }

            rows.push(EventRow {
                id,
                timestamp: packet.timestamp,
                sfp: packet.source.sfp,
                board: packet.source.board,
                channel: packet.source.channel,
                kind,
                value,
                energy,
                pileup: pileup as u8,
                clip: clip as u8,
                beam_on: packet.beam_on as u8,
                traced: traced as u8,
            });
        }

        let chunk_name = format!("chunk_{}", self.chunk_counter);
        self.chunk_counter += 1;
        self.events_group
            .new_dataset_builder()
            .with_data(rows.as_slice())
            .create(chunk_name.as_str())?;

        Ok(())
    }

    /// Write segment file information in a separate yaml file
    pub fn write_fileinfo(&self, merger: &Merger) -> Result<(), HDF5WriterError> {
        let file_stacks = merger.get_file_stacks();
        let mut file_map = BTreeMap::<String, Vec<String>>::new();
        for stack in file_stacks.iter() {
            let file_name = format!("sfp{}_file_names", stack.get_sfp_number());
            let size_name = format!("sfp{}_file_sizes", stack.get_sfp_number());
            let file_stack = stack.get_file_stack_ref();
            let mut file_list = Vec::<String>::new();
            file_list.resize(file_stack.len() + 1, String::from(""));
            let mut size_list = file_list.clone();
            size_list[0] =
                human_bytes::human_bytes(stack.get_active_file().get_size_bytes() as f64); // Active file is the first one
            file_list[0] = String::from(stack.get_active_file().get_filename().to_string_lossy());
            for (row, path) in file_stack.iter().enumerate() {
                size_list[row + 1] = human_bytes::human_bytes(path.metadata()?.len() as f64);
                file_list[row + 1] = String::from(path.to_string_lossy());
            }
            file_map.insert(file_name, file_list);
            file_map.insert(size_name, size_list);
        }

        let mut parent_file = std::fs::File::create(&self.parent_file_path)?;
        parent_file.write_all(serde_yaml::to_string(&file_map)?.as_bytes())?;

        Ok(())
    }

    /// Write meta information and the counter snapshot, consume the writer
    pub fn close(self, summary: &RunSummary) -> Result<(), HDF5WriterError> {
        self.events_group
            .attr("min_event")?
            .write_scalar(&START_EVENT_NUMBER)?;
        self.events_group
            .attr("max_event")?
            .write_scalar(&self.next_event_id.saturating_sub(1))?;
        let first_timestamp = self.first_timestamp.unwrap_or(0);
        self.events_group
            .attr("first_timestamp")?
            .write_scalar(&first_timestamp)?;
        self.events_group
            .attr("last_timestamp")?
            .write_scalar(&self.last_timestamp)?;
        self.events_group
            .attr("run_start")?
            .write_scalar(&self.run_start)?;
        self.events_group
            .attr("run_stop")?
            .write_scalar(&time::OffsetDateTime::now_utc().unix_timestamp())?;
        self.events_group
            .attr("data_groups")?
            .write_scalar(&summary.counters.data)?;
        self.events_group
            .attr("jumps")?
            .write_scalar(&summary.counters.jump)?;
        self.events_group
            .attr("warps")?
            .write_scalar(&summary.counters.warp)?;
        self.events_group
            .attr("mashes")?
            .write_scalar(&summary.counters.mash)?;
        self.events_group
            .attr("rejects")?
            .write_scalar(&summary.counters.reject)?;
        self.events_group
            .attr("dropped_late")?
            .write_scalar(&summary.dropped_late)?;
        self.events_group
            .attr("ebis_filtered")?
            .write_scalar(&summary.ebis_filtered)?;
        log::info!(
            "{} events written. Run lasted {} seconds.",
            self.next_event_id,
            (self.last_timestamp - first_timestamp) / TIMESTAMP_CLOCK_HZ as i64, // Time stamp clock is 100 MHz
        );
        Ok(())
    }
}
