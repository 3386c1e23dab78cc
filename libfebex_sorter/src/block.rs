use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use super::constants::*;
use super::error::BlockError;

/// One fixed-size DAQ transport block.
///
/// The FEBEX readout writes 32 KiB blocks: a 16-byte header (magic, block
/// sequence number, SFP id, payload word count, 4 reserved bytes) followed
/// by up to [`BLOCK_WORDS`] little-endian 64-bit words. Unused payload at
/// the tail is padding and is never parsed.
#[derive(Debug, Clone)]
pub struct Block {
    pub sequence: u32,
    pub sfp: u16,
    pub words: Vec<u64>,
}

impl Block {
    /// Parse a block from a raw [`BLOCK_SIZE`] buffer.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self, BlockError> {
        let mut cursor = Cursor::new(buffer);
        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != BLOCK_MAGIC {
            return Err(BlockError::BadMagic(magic));
        }
        let sequence = cursor.read_u32::<LittleEndian>()?;
        let sfp = cursor.read_u16::<LittleEndian>()?;
        let word_count = cursor.read_u16::<LittleEndian>()?;
        cursor.read_u32::<LittleEndian>()?; // reserved
        if word_count as usize > BLOCK_WORDS {
            return Err(BlockError::BadWordCount(word_count));
        }

        let mut words = Vec::with_capacity(word_count as usize);
        for _ in 0..word_count {
            words.push(cursor.read_u64::<LittleEndian>()?);
        }

        Ok(Block {
            sequence,
            sfp,
            words,
        })
    }
}
