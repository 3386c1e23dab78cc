use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;
use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error)]
pub enum WordError {
    #[error("Unknown info code {0} found in an info word")]
    UnknownInfoCode(u8),
    #[error("Sample word 0x{0:016x} found with no trace header pending")]
    OrphanSamples(u64),
}

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Failed to parse buffer into Block: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Incorrect magic 0x{0:08x} found for Block; expected 0x{exp:08x}", exp=BLOCK_MAGIC)]
    BadMagic(u32),
    #[error("Incorrect word count {0} found for Block; at most {max} words fit a block", max=BLOCK_WORDS)]
    BadWordCount(u16),
}

#[derive(Debug, Error)]
pub enum DataFileError {
    #[error("Error when parsing Block from DataFile: {0}")]
    BadBlock(#[from] BlockError),
    #[error("Could not open DataFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Reached end of DataFile")]
    EndOfFile,
    #[error("DataFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SfpStackError {
    #[error("SfpStack failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("SfpStack did not find any matching segment files for SFP {0}")]
    NoMatchingFiles(u8),
    #[error("SfpStack failed due to DataFile error: {0}")]
    FileError(#[from] DataFileError),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("Calibration failed to parse a coefficient: {0}")]
    BadCoefficient(#[from] std::num::ParseFloatError),
    #[error("Calibration was given a file with the incorrect format; most likely the number of columns is incorrect")]
    BadFileFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("EBIS period {0} is negative; use 0 to disable the gate")]
    InvalidEbisPeriod(i64),
    #[error("EBIS window width {0} must be positive and below the period")]
    InvalidEbisWindow(i64),
    #[error("Timestamp layout has a zero-width LSB register")]
    LayoutZeroLsb,
    #[error("Timestamp layout is {0} bits wide; at most {max} bits fit a signed timestamp", max=MAX_LAYOUT_BITS)]
    LayoutTooWide(u32),
    #[error("Jump threshold {0} must be positive")]
    InvalidJumpThreshold(i64),
    #[error("Warp tolerance {0} must be positive and below the jump threshold {1}")]
    InvalidWarpTolerance(i64, i64),
    #[error("Number of workers {0} must be at least 1")]
    InvalidWorkerCount(i32),
    #[error("First run number {0} is after last run number {1}")]
    InvalidRunRange(i32, i32),
}

#[derive(Debug, Error)]
pub enum MergerError {
    #[error("Merger failed due to SfpStack error: {0}")]
    StackError(#[from] SfpStackError),
    #[error("Merger failed because no segment files were found in the run directory")]
    NoFilesError,
    #[error("Merger failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Merger failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Clone, Error)]
pub enum OrderingError {
    #[error("Partial drains are only supported by the map strategy")]
    PartialDrainUnsupported,
    #[error("Drain watermark {0} is behind the previous watermark {1}")]
    WatermarkRegression(i64, i64),
}

#[derive(Debug, Error)]
pub enum HDF5WriterError {
    #[error("HDF5Writer failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("HDF5Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("HDF5Writer failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Merger error: {0}")]
    MergerError(#[from] MergerError),
    #[error("Processor failed due to Ordering error: {0}")]
    OrderingError(#[from] OrderingError),
    #[error("Processor failed due to HDF5Writer error: {0}")]
    HDFError(#[from] HDF5WriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Calibration error: {0}")]
    CalibrationError(#[from] CalibrationError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
