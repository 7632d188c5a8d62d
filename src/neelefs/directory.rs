use std::collections::HashSet;

use log::{debug, info, warn};

use crate::{
    disk_format::{
        block::BlockNumber,
        directory_block::{DirectoryBlock, ModernBlock, DIRECTORY_HEADER_SIZE},
        directory_entry::{DirectoryEntry, EntryName},
    },
    error::{Error, Result},
    storage::BlockStorage,
};

use super::Neelefs;

/// A live entry located in a directory chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundEntry {
    /// The chain block holding the entry, relative to the superblock.
    pub block: BlockNumber,
    /// Byte offset of the entry within that block.
    pub offset: usize,
    pub entry: DirectoryEntry,
}

/// Guards a chain walk against next-block pointers that loop back.
struct ChainWalk {
    start: BlockNumber,
    visited: HashSet<BlockNumber>,
}

impl ChainWalk {
    fn new(start: BlockNumber) -> Self {
        Self {
            start,
            visited: HashSet::new(),
        }
    }

    fn enter(&mut self, block: BlockNumber) -> Result<()> {
        if block == 0 {
            return Err(Error::corruption(
                block,
                format!("directory chain from block {} points at the superblock", self.start),
            ));
        }

        if !self.visited.insert(block) {
            return Err(Error::corruption(
                block,
                format!("directory chain from block {} loops", self.start),
            ));
        }

        Ok(())
    }
}

impl<S: BlockStorage> Neelefs<S> {
    /// Looks up `name` in the directory whose chain starts at `dir_block`.
    pub fn find_entry(&self, dir_block: BlockNumber, name: &EntryName) -> Result<Option<FoundEntry>> {
        let mut walk = ChainWalk::new(dir_block);
        let mut current = Some(dir_block);

        while let Some(block_number) = current {
            walk.enter(block_number)?;
            let block = self.read_directory_block(block_number)?;

            for offset in block.slot_offsets() {
                let slot_name = block.name_at(offset);
                if slot_name.is_free() || slot_name != *name {
                    continue;
                }

                let entry = block.entry_at(offset).map_err(|err| {
                    Error::corruption(block_number, format!("entry at offset {offset}: {err}"))
                })?;

                return Ok(Some(FoundEntry {
                    block: block_number,
                    offset,
                    entry,
                }));
            }

            current = block.next_block();
        }

        Ok(None)
    }

    /// Inserts `entry` into the first free slot of the directory chain starting at `dir_block`,
    /// growing the chain by one block if every slot is taken.
    ///
    /// A legacy block met on the way is rewritten in header form before its slots are scanned.
    pub fn add_entry(&mut self, dir_block: BlockNumber, entry: &DirectoryEntry) -> Result<()> {
        let mut walk = ChainWalk::new(dir_block);
        let mut block_number = dir_block;

        loop {
            walk.enter(block_number)?;

            let directory = self.read_directory_block(block_number)?;
            if directory.is_legacy() {
                warn!("upgrading legacy directory block {block_number} to the chained layout");
            }
            let mut block = directory.into_modern();

            if let Some(offset) = block.free_slot() {
                block.write_entry(offset, entry)?;
                self.write_block(block_number, block.to_block()?)?;

                debug!(
                    "added entry {} to directory block {block_number} at offset {offset}",
                    entry.name
                );
                return Ok(());
            }

            if let Some(next) = block.next_block() {
                block_number = next;
                continue;
            }

            let Some(new_block) = self.allocate_contiguous(1)? else {
                return Err(Error::DirectoryFull { block: dir_block });
            };

            let mut extension = ModernBlock::new();
            extension.write_entry(DIRECTORY_HEADER_SIZE, entry)?;
            self.write_block(new_block, extension.to_block()?)?;

            block.set_next_block(new_block);
            self.write_block(block_number, block.to_block()?)?;

            info!(
                "extended directory chain {dir_block} with block {new_block} after block {block_number}"
            );
            return Ok(());
        }
    }

    /// Replaces the entry at a position previously returned by [`Self::find_entry`].
    ///
    /// The block keeps its layout: a legacy block is rewritten without a header.
    pub fn overwrite_entry(&mut self, found: &FoundEntry, entry: &DirectoryEntry) -> Result<()> {
        let mut block = self.read_directory_block(found.block)?;
        block.write_entry(found.offset, entry)?;

        self.write_block(found.block, block.to_block()?)
    }

    /// Writes an empty directory block at `block_number`.
    pub fn init_directory_block(&mut self, block_number: BlockNumber) -> Result<()> {
        self.write_block(block_number, ModernBlock::new().to_block()?)
    }

    /// Collects every live entry of the directory chain starting at `dir_block`, in chain order.
    pub fn read_directory(&self, dir_block: BlockNumber) -> Result<Vec<DirectoryEntry>> {
        let mut walk = ChainWalk::new(dir_block);
        let mut current = Some(dir_block);
        let mut entries = vec![];

        while let Some(block_number) = current {
            walk.enter(block_number)?;
            let block = self.read_directory_block(block_number)?;

            for offset in block.slot_offsets() {
                if block.name_at(offset).is_free() {
                    continue;
                }

                entries.push(block.entry_at(offset).map_err(|err| {
                    Error::corruption(block_number, format!("entry at offset {offset}: {err}"))
                })?);
            }

            current = block.next_block();
        }

        Ok(entries)
    }

    /// Every block of the directory chain starting at `dir_block`, in chain order.
    pub fn directory_chain(&self, dir_block: BlockNumber) -> Result<Vec<BlockNumber>> {
        let mut walk = ChainWalk::new(dir_block);
        let mut current = Some(dir_block);
        let mut blocks = vec![];

        while let Some(block_number) = current {
            walk.enter(block_number)?;
            blocks.push(block_number);
            current = self.read_directory_block(block_number)?.next_block();
        }

        Ok(blocks)
    }

    fn read_directory_block(&self, block_number: BlockNumber) -> Result<DirectoryBlock> {
        let data = self.read_block(block_number)?;

        DirectoryBlock::parse(block_number, data)
    }
}
