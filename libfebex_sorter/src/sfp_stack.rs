use super::block::Block;
use super::constants::SEGMENT_EXTENSION;
use super::data_file::DataFile;
use super::error::{DataFileError, SfpStackError};

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// The chain of segment files written for one SFP link of a run.
///
/// The DAQ splits each SFP stream into 2.0 GB segments named
/// `sfp{N}_XXXX.febex`. The stack is the ordered collection of all
/// segments belonging to one SFP, read as a single continuous stream.
#[allow(dead_code)]
#[derive(Debug)]
pub struct SfpStack {
    pub file_stack: VecDeque<PathBuf>,
    active_file: DataFile,
    pub total_stack_size_bytes: u64,
    is_ended: bool,
    sfp_id: u8,
    last_sequence: Option<u32>,
}

impl SfpStack {
    /// Create a new SfpStack for one SFP of a given run directory
    pub fn new(run_path: &Path, sfp_id: u8) -> Result<Self, SfpStackError> {
        let (mut stack, bytes) = Self::get_file_stack(run_path, sfp_id)?;
        if let Some(file_path) = stack.pop_front() {
            Ok(SfpStack {
                file_stack: stack,
                active_file: DataFile::new(&file_path)?,
                total_stack_size_bytes: bytes,
                is_ended: false,
                sfp_id,
                last_sequence: None,
            })
        } else {
            Err(SfpStackError::NoMatchingFiles(sfp_id))
        }
    }

    /// Get the next block in the file stack
    ///
    /// Returns a `Result<Option<Block>>`. The Option is None if the stack
    /// has no more data.
    pub fn get_next_block(&mut self) -> Result<Option<Block>, SfpStackError> {
        loop {
            if self.is_ended {
                return Ok(None);
            }

            match self.active_file.get_next_block() {
                Ok(block) => {
                    self.check_continuity(&block);
                    return Ok(Some(block));
                }
                Err(DataFileError::EndOfFile) => {
                    self.move_to_next_file()?;
                }
                Err(e) => return Err(SfpStackError::FileError(e)),
            };
        }
    }

    /// The block sequence counter runs over the whole SFP stream, across
    /// segment boundaries. Gaps mean the DAQ dropped a transport buffer.
    fn check_continuity(&mut self, block: &Block) {
        if block.sfp != self.sfp_id as u16 {
            log::warn!(
                "Block on SFP {} stack reports SFP {}; the file may be misnamed",
                self.sfp_id,
                block.sfp
            );
        }
        if let Some(previous) = self.last_sequence {
            if block.sequence != previous.wrapping_add(1) {
                log::warn!(
                    "Block sequence discontinuity on SFP {}: {} -> {}",
                    self.sfp_id,
                    previous,
                    block.sequence
                );
            }
        }
        self.last_sequence = Some(block.sequence);
    }

    /// Get all of the associated segment files and put them in the stack
    fn get_file_stack(
        parent_path: &Path,
        sfp_id: u8,
    ) -> Result<(VecDeque<PathBuf>, u64), SfpStackError> {
        let mut file_list: Vec<PathBuf> = Vec::new();
        let start_pattern = format!("sfp{sfp_id}_");
        for item in parent_path.read_dir()? {
            let item_path = item?.path();
            let item_name = match item_path.file_name().and_then(|name| name.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if item_name.starts_with(&start_pattern) && item_name.ends_with(SEGMENT_EXTENSION) {
                file_list.push(item_path);
            }
        }

        if file_list.is_empty() {
            return Err(SfpStackError::NoMatchingFiles(sfp_id));
        }

        let mut total_stack_size_bytes = 0;
        for path in file_list.iter() {
            total_stack_size_bytes += path.metadata()?.len();
        }

        file_list.sort(); // Can sort standard. The only change should be the segment number.
        let stack = file_list.into();

        Ok((stack, total_stack_size_bytes))
    }

    /// Move to the next file in the stack
    fn move_to_next_file(&mut self) -> Result<(), SfpStackError> {
        loop {
            if let Some(next_file_path) = self.file_stack.pop_front() {
                let next_file = DataFile::new(&next_file_path)?;
                if !next_file.is_eof() {
                    self.active_file = next_file;
                    return Ok(());
                }
            } else {
                self.is_ended = true;
                return Ok(());
            }
        }
    }

    pub fn get_sfp_number(&self) -> u8 {
        self.sfp_id
    }

    pub fn get_file_stack_ref(&self) -> &VecDeque<PathBuf> {
        &self.file_stack
    }

    pub fn get_active_file(&self) -> &DataFile {
        &self.active_file
    }
}
