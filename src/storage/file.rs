use std::fs::File;
use std::os::unix::prelude::FileExt;

use crate::disk_format::block::{Block, BlockNumber, BLOCK_SIZE, EMPTY_BLOCK};
use crate::error::{Error, Result};

use super::block_storage::BlockStorage;

/// A disk image backed by a file opened for reading (and, to mutate it, writing).
pub struct FileBackedStorage(File);

impl FileBackedStorage {
    pub fn new(file: File) -> Self {
        FileBackedStorage(file)
    }

    pub fn into_inner(self) -> File {
        self.0
    }
}

impl BlockStorage for FileBackedStorage {
    fn read_block(&self, block_number: BlockNumber) -> Result<Block> {
        let mut buf = EMPTY_BLOCK;
        let position = block_number * BLOCK_SIZE;

        self.0
            .read_exact_at(&mut buf, position as u64)
            .map_err(|source| Error::Io {
                block: block_number,
                source,
            })?;

        Ok(buf)
    }

    fn write_block(&self, block_number: BlockNumber, block: Block) -> Result<()> {
        let position = block_number * BLOCK_SIZE;

        self.0
            .write_all_at(&block, position as u64)
            .map_err(|source| Error::Io {
                block: block_number,
                source,
            })?;

        Ok(())
    }
}
