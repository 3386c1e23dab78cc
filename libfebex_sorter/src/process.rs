use std::sync::mpsc::Sender;

use super::calibration::EnergyCalibration;
use super::config::Config;
use super::constants::BLOCK_SIZE;
use super::converter::{Converter, RunSummary};
use super::error::ProcessorError;
use super::hdf_writer::HDFWriter;
use super::merger::Merger;
use super::ordering::SortStrategy;
use super::worker_status::{BarColor, WorkerStatus};

/// The end-of-run counter summary, the primary diagnostic surface of a run.
fn log_summary(run_number: i32, summary: &RunSummary) {
    let counters = &summary.counters;
    log::info!(
        "Run {} groups: {} total, {} normal, {} jumps, {} warps, {} mashes, {} rejected",
        run_number,
        counters.data,
        counters.normal(),
        counters.jump,
        counters.warp,
        counters.mash,
        counters.reject
    );
    log::info!(
        "Run {} stream: {} blocks, {} channels, {} late drops, {} outside the EBIS gate, {} unknown words, {} orphan samples",
        run_number,
        summary.blocks,
        summary.channels,
        summary.dropped_late,
        summary.ebis_filtered,
        summary.unknown_words,
        summary.orphan_samples
    );
    for (board, stats) in summary.boards.iter() {
        log::info!(
            "Run {} sfp {} board {}: {} hits, {} pauses, {} resumes, {} syncs",
            run_number,
            board.sfp,
            board.board,
            stats.hits,
            stats.pauses,
            stats.resumes,
            stats.syncs
        );
    }
}

/// The main loop of febex_sorter.
///
/// This takes in a config (and progress monitor) and performs the sorting logic for one run:
/// blocks from the Merger flow through the Converter into the HDFWriter. With the map
/// strategy the ordering buffer is drained at block boundaries; the vector strategy
/// buffers the whole run and drains once at the end.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    // Bad parameters must abort before any data is consumed
    config.validate()?;

    let hdf_path = config.get_hdf_file_name(run_number)?;
    let calibration = EnergyCalibration::new(config.calibration_path.as_deref())?;
    let mut converter = Converter::new(config, calibration)?;
    let mut writer = HDFWriter::new(&hdf_path)?;

    let mut merger = Merger::new(config, run_number)?;
    log::info!(
        "Total run size: {}",
        human_bytes::human_bytes(*merger.get_total_data_size() as f64)
    );
    let total_data_size = merger.get_total_data_size();
    let flush_frac: f32 = 0.01;
    let mut count = 0;
    let mut progress: f32 = 0.0;
    let flush_val = (*total_data_size as f64 * flush_frac as f64) as u64;

    log::info!("Sorting raw data...");
    writer.write_fileinfo(&merger)?;
    tx.send(WorkerStatus::new(
        0.0,
        run_number,
        *worker_id,
        BarColor::CYAN,
    ))?;
    while let Some(block) = merger.get_next_block()? {
        count += BLOCK_SIZE as u64;
        if count > flush_val {
            count = 0;
            progress += flush_frac;
            tx.send(WorkerStatus::new(
                progress,
                run_number,
                *worker_id,
                BarColor::CYAN,
            ))?;
        }

        converter.process_block(block);
        if converter.strategy() == SortStrategy::Map {
            writer.write_events(converter.drain_ready()?)?;
        }
    }

    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        BarColor::MAGENTA,
    ))?;
    log::info!("Writing buffered events...");
    writer.write_events(converter.drain_all())?;

    let summary = converter.summary();
    log_summary(run_number, &summary);
    writer.close(&summary)?;
    log::info!("Done with run {}.", run_number);
    Ok(())
}

/// The function to be called by a separate thread (typically the UI).
/// This particular flavor is unused by the default tool (febex_sorter_cli)
/// but could be useful to someone else
/// Allows multiple runs to be processed
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<(), ProcessorError> {
    for run in config.first_run_number..(config.last_run_number + 1) {
        if config.does_run_exist(run) {
            log::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            log::info!("Finished processing run {}.", run);
        } else {
            log::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Process a subset of runs
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<(), ProcessorError> {
    for run in subset {
        if config.does_run_exist(run) {
            log::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            log::info!("Finished processing run {}.", run);
        } else {
            log::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); config.n_workers as usize];
    let n_subsets = subsets.len();

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}
