use std::cell::RefCell;
use std::io;

use crate::disk_format::block::{Block, BlockNumber, EMPTY_BLOCK};
use crate::error::{Error, Result};

use super::block_storage::BlockStorage;

/// A disk image held in memory. Its size is fixed at construction.
pub struct MemoryStorage {
    blocks: RefCell<Vec<Block>>,
}

impl MemoryStorage {
    /// Constructs a zero-filled image of `num_blocks` blocks.
    #[must_use]
    pub fn new(num_blocks: usize) -> Self {
        Self::from_blocks(vec![EMPTY_BLOCK; num_blocks])
    }

    #[must_use]
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: RefCell::new(blocks),
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.borrow().len()
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks.into_inner()
    }
}

fn out_of_bounds(block_number: BlockNumber, num_blocks: usize) -> Error {
    Error::Io {
        block: block_number,
        source: io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("image has only {num_blocks} blocks"),
        ),
    }
}

impl BlockStorage for MemoryStorage {
    fn read_block(&self, block_number: BlockNumber) -> Result<Block> {
        let blocks = self.blocks.borrow();

        blocks
            .get(block_number)
            .copied()
            .ok_or_else(|| out_of_bounds(block_number, blocks.len()))
    }

    fn write_block(&self, block_number: BlockNumber, block: Block) -> Result<()> {
        let mut blocks = self.blocks.borrow_mut();
        let num_blocks = blocks.len();

        let slot = blocks
            .get_mut(block_number)
            .ok_or_else(|| out_of_bounds(block_number, num_blocks))?;
        *slot = block;

        Ok(())
    }
}
