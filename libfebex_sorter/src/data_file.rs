use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::block::Block;
use super::constants::BLOCK_SIZE;
use super::error::DataFileError;

/// One raw FEBEX segment file, read block by block.
///
/// Segment files are a whole number of fixed-size blocks; a trailing
/// partial block means the DAQ was cut off mid-write and surfaces as an
/// IO error rather than a silent truncation.
#[derive(Debug)]
pub struct DataFile {
    handle: File,
    path: PathBuf,
    size_bytes: u64,
    read_bytes: u64,
}

impl DataFile {
    pub fn new(path: &Path) -> Result<Self, DataFileError> {
        if !path.exists() {
            return Err(DataFileError::BadFilePath(path.to_path_buf()));
        }
        let handle = File::open(path)?;
        let size_bytes = handle.metadata()?.len();
        Ok(DataFile {
            handle,
            path: path.to_path_buf(),
            size_bytes,
            read_bytes: 0,
        })
    }

    /// Read the next block.
    ///
    /// Returns `Err(DataFileError::EndOfFile)` once the file is exhausted.
    pub fn get_next_block(&mut self) -> Result<Block, DataFileError> {
        if self.is_eof() {
            return Err(DataFileError::EndOfFile);
        }
        let mut buffer = [0u8; BLOCK_SIZE];
        self.handle.read_exact(&mut buffer)?;
        self.read_bytes += BLOCK_SIZE as u64;
        Ok(Block::from_buffer(&buffer)?)
    }

    pub fn is_eof(&self) -> bool {
        self.read_bytes >= self.size_bytes
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn get_filename(&self) -> &Path {
        &self.path
    }
}
