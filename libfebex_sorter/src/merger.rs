use super::block::Block;
use super::config::Config;
use super::constants::NUMBER_OF_SFPS;
use super::error::{MergerError, SfpStackError};
use super::sfp_stack::SfpStack;

/// Merger owns every SFP stack of one run and deals out their blocks.
///
/// Blocks are dealt round-robin across the SFP links so no single link can
/// starve the decode stage; putting the resulting cross-link stream back
/// into time order is the job of the ordering engine, not the Merger.
#[derive(Debug)]
pub struct Merger {
    file_stacks: Vec<SfpStack>,
    total_data_size: u64,
    next_stack: usize,
}

impl Merger {
    /// Create a new Merger for a run, opening the stack of every cabled SFP.
    ///
    /// An SFP with no segment files is simply absent from the run; a run
    /// with no segment files at all is an error.
    pub fn new(config: &Config, run_number: i32) -> Result<Self, MergerError> {
        let run_dir = config.get_run_directory(run_number)?;
        let mut file_stacks = Vec::new();
        for sfp in 0..NUMBER_OF_SFPS {
            match SfpStack::new(&run_dir, sfp) {
                Ok(stack) => file_stacks.push(stack),
                Err(SfpStackError::NoMatchingFiles(_)) => continue,
                Err(e) => return Err(MergerError::StackError(e)),
            }
        }

        if file_stacks.is_empty() {
            return Err(MergerError::NoFilesError);
        }

        let total_data_size = file_stacks
            .iter()
            .map(|stack| stack.total_stack_size_bytes)
            .sum();

        Ok(Merger {
            file_stacks,
            total_data_size,
            next_stack: 0,
        })
    }

    /// Get the next block from the run, cycling over the SFP stacks.
    ///
    /// Returns a `Result<Option<Block>>`. The Option is None once every
    /// stack is exhausted.
    pub fn get_next_block(&mut self) -> Result<Option<Block>, MergerError> {
        for _ in 0..self.file_stacks.len() {
            let index = self.next_stack;
            self.next_stack = (self.next_stack + 1) % self.file_stacks.len();
            if let Some(block) = self.file_stacks[index].get_next_block()? {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    pub fn get_total_data_size(&self) -> &u64 {
        &self.total_data_size
    }

    pub fn get_file_stacks(&self) -> &Vec<SfpStack> {
        &self.file_stacks
    }
}
