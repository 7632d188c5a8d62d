use bitvec::{order::Lsb0, view::BitView};
use log::{debug, info};

use crate::{
    disk_format::block::{BlockNumber, BITS_PER_BLOCK},
    error::{Error, Result},
    storage::BlockStorage,
};

use super::Neelefs;

impl<S: BlockStorage> Neelefs<S> {
    /// Whether block `index` is marked allocated.
    pub fn bit_get(&self, index: BlockNumber) -> Result<bool> {
        let (bitmap_block, bit) = self.bitmap_position(index)?;
        let sector = self.read_block(bitmap_block)?;

        Ok(sector.view_bits::<Lsb0>()[bit])
    }

    /// Marks block `index` allocated (`used`) or free.
    pub fn bit_set(&mut self, index: BlockNumber, used: bool) -> Result<()> {
        let (bitmap_block, bit) = self.bitmap_position(index)?;
        let mut sector = self.read_block(bitmap_block)?;

        sector.view_bits_mut::<Lsb0>().set(bit, used);

        self.write_block(bitmap_block, sector)
    }

    /// Reserves `count` contiguous blocks using first-fit, returning the first one.
    ///
    /// Returns `None` without touching the bitmap if no free run is long enough. A request for
    /// zero blocks reserves nothing and succeeds at the first allocatable block.
    pub fn allocate_contiguous(&mut self, count: usize) -> Result<Option<BlockNumber>> {
        let first = self.superblock.first_allocatable_block();
        if count == 0 {
            return Ok(Some(first));
        }

        let mut run_start = first;
        let mut run_len = 0;

        for index in first..self.superblock.total_blocks {
            if self.bit_get(index)? {
                run_len = 0;
                continue;
            }

            if run_len == 0 {
                run_start = index;
            }
            run_len += 1;

            if run_len == count {
                for block in run_start..run_start + count {
                    self.bit_set(block, true)?;
                }

                info!("allocated {count} block(s) starting at block {run_start}");
                return Ok(Some(run_start));
            }
        }

        debug!("no run of {count} free block(s) in {} blocks", self.superblock.total_blocks);
        Ok(None)
    }

    /// Locates the bit for block `index`: the bitmap block holding it (relative to the
    /// superblock) and the bit offset within that block.
    fn bitmap_position(&self, index: BlockNumber) -> Result<(BlockNumber, usize)> {
        if index >= self.superblock.total_blocks {
            return Err(Error::corruption(
                index,
                format!(
                    "no bitmap bit for a block outside the filesystem ({} blocks)",
                    self.superblock.total_blocks
                ),
            ));
        }

        Ok((
            self.superblock.bitmap_start + index / BITS_PER_BLOCK,
            index % BITS_PER_BLOCK,
        ))
    }
}
