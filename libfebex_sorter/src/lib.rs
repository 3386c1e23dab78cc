//! # febex_sorter
//!
//! febex_sorter is a time sorter for FEBEX-based data acquisition, written in
//! Rust. It takes the raw block files written per SFP link by the DAQ,
//! reconstructs the full-width timestamp of every hit from the split hardware
//! registers, classifies timing anomalies, tags each event against the
//! periodic EBIS beam gate, and writes a single time-ordered event stream in
//! the HDF5 format.
//!
//! ## Installation
//!
//! febex_sorter is installed from source. If you have not used Rust before,
//! you will most likely need to install the Rust tool chain; see the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### HDF5
//!
//! Before building and running febex_sorter, HDF5 must be installed.
//! Typically this will be installed using a package manager (homebrew, apt,
//! etc), and the Rust libraries will auto detect the location of the HDF
//! install. If a custom install location is used, write the following snippet
//! into the file `.cargo/config.toml` in the febex_sorter repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./febex_sorter_cli`
//! from the top level febex_sorter repository.
//!
//! ## Configuration
//!
//! Runs are described by a YAML configuration file. The `new` subcommand
//! (`febex_sorter_cli --path my_config.yml new`) writes a template. The
//! format is as follows:
//!
//! ```yml
//! data_path: /data/experiment/raw
//! hdf_path: /data/experiment/sorted
//! calibration_path: null
//! first_run_number: 0
//! last_run_number: 0
//! n_workers: 1
//! sort_strategy: map
//! ebis_only: false
//! write_traces: true
//! ebis:
//!   period: 100000000
//!   reference_phase: 0
//!   window: 4000000
//! timestamp_layout:
//!   lsb_bits: 28
//!   msb_bits: 20
//!   hsb_bits: 12
//! thresholds:
//!   jump_threshold: 4294967296
//!   warp_tolerance: 268435456
//! ```
//!
//! - `data_path`: directory containing the `run_NNNN` raw directories written
//!   by the DAQ, each holding per-SFP segment files (`sfp0_0001.febex`, ...).
//! - `hdf_path`: directory to which sorted `.h5` files are written.
//! - `calibration_path`: optional CSV of per-channel linear energy
//!   calibrations (`sfp,board,channel,gain,offset`); `null` uses raw ADC
//!   values.
//! - `first_run_number`/`last_run_number`: the inclusive run range.
//! - `n_workers`: number of parallel worker threads to divide the runs
//!   amongst. Must be at least 1.
//! - `sort_strategy`: `map` keeps the ordering buffer sorted and drains it
//!   incrementally (bounded memory); `vector` buffers the full run and sorts
//!   once at the end. Both produce identical output.
//! - `ebis_only`: keep only the hits inside the EBIS beam gate.
//! - `write_traces`: carry digitized traces into the output.
//! - `ebis`: gate period, reference phase, and window width in 10 ns clock
//!   ticks; a period of 0 disables the gate.
//! - `timestamp_layout`: register bit widths of the firmware build.
//! - `thresholds`: anomaly classifier tuning in clock ticks.
//!
//! ## Output
//!
//! febex_sorter writes one HDF5 file and one YAML sidecar per run. The data
//! format used in the HDF5 data is as follows:
//!
//! ```text
//! run_0001.h5
//! events - min_event, max_event, first_timestamp, last_timestamp,
//! |        run_start, run_stop, version, data_groups, jumps, warps,
//! |        mashes, rejects, dropped_late, ebis_filtered
//! |---- chunk_#(dset) - one row per event: id, timestamp, sfp, board,
//! |                     channel, kind, value, energy, pileup, clip,
//! |                     beam_on, traced
//! traces
//! |---- event_#(dset) - u16 trace samples for traced events
//! ```
//!
//! Chunks are written in drain order; concatenating `chunk_0`, `chunk_1`, ...
//! reproduces the globally time-ordered stream. The sidecar
//! (`run_0001.yml`) lists the raw segment files and their sizes per SFP.
//! The counters written on the events group (and logged at end of run) are
//! the anomaly summary: total fragment groups, jumps, warps, mashes, and
//! rejected groups, plus late-dropped packets and gate-filtered hits.
pub mod block;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod converter;
pub mod data_file;
pub mod data_word;
pub mod ebis;
pub mod error;
pub mod event;
pub mod hardware_id;
pub mod hdf_writer;
pub mod merger;
pub mod ordering;
pub mod process;
pub mod sfp_stack;
pub mod timestamp;
pub mod worker_status;
