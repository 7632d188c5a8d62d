use log::{info, warn};

use crate::{
    disk_format::{
        block::{blocks_for, BlockNumber, BLOCK_SIZE, EMPTY_BLOCK},
        directory_entry::{DirectoryEntry, EntryName},
    },
    error::{Error, Result},
    storage::BlockStorage,
};

use super::{Neelefs, Node};

impl<S: BlockStorage> Neelefs<S> {
    /// Stores `data` at `path`, creating missing parent directories.
    ///
    /// The contents always go to a freshly allocated contiguous extent. If `path` already has an
    /// entry, that entry is overwritten in place and the extent it referenced stays allocated;
    /// nothing is ever reclaimed.
    ///
    /// Returns the entry that was written.
    pub fn put_file(&mut self, data: &[u8], path: &str) -> Result<DirectoryEntry> {
        let (parent, leaf) = self.resolve_parent(path)?;
        if leaf.is_empty() {
            return Err(Error::InvalidPath {
                path: path.to_owned(),
                reason: "destination must name a file",
            });
        }

        let num_blocks = blocks_for(data.len());
        let start = if num_blocks == 0 {
            0
        } else {
            self.allocate_contiguous(num_blocks)?
                .ok_or(Error::OutOfSpace {
                    requested: num_blocks,
                })?
        };

        self.write_extent(start, data)?;

        let name = EntryName::new(&leaf);
        let entry = DirectoryEntry::file(name, start, data);

        match self.find_entry(parent, &name)? {
            Some(found) => {
                if found.entry.is_directory() {
                    warn!("{path}: replacing a directory entry with a file entry");
                } else if found.entry.size > 0 {
                    warn!(
                        "{path}: previous extent at block {} ({} bytes) is left allocated",
                        found.entry.block, found.entry.size
                    );
                }

                self.overwrite_entry(&found, &entry)?;
            }
            None => self.add_entry(parent, &entry)?,
        }

        info!(
            "wrote {path}: {} bytes in {num_blocks} block(s) at block {start}, crc32 {:#010x}",
            data.len(),
            entry.checksum
        );
        Ok(entry)
    }

    /// Reads the contents of the file at `path`.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        match self.lookup(path)? {
            Node::File(entry) => self.read_extent(&entry),
            Node::Directory(_) => Err(Error::NotAFile {
                path: path.to_owned(),
            }),
        }
    }

    /// Reads the exact bytes a file entry describes.
    pub fn read_extent(&self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        let size = entry.size as usize;
        let start = entry.block_number();
        let num_blocks = blocks_for(size);

        if start + num_blocks > self.superblock.total_blocks {
            return Err(Error::corruption(
                start,
                format!(
                    "extent of {} ({num_blocks} blocks) runs past the end of the filesystem",
                    entry.name
                ),
            ));
        }

        let mut data = Vec::with_capacity(num_blocks * BLOCK_SIZE);
        for block in start..start + num_blocks {
            data.extend_from_slice(&self.read_block(block)?);
        }
        data.truncate(size);

        Ok(data)
    }

    /// Writes `data` block by block starting at `start`, zero-padding the last block.
    fn write_extent(&mut self, start: BlockNumber, data: &[u8]) -> Result<()> {
        for (i, chunk) in data.chunks(BLOCK_SIZE).enumerate() {
            let mut block = EMPTY_BLOCK;
            block[..chunk.len()].copy_from_slice(chunk);

            self.write_block(start + i, block)?;
        }

        Ok(())
    }
}
