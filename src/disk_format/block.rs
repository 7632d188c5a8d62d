use std::mem::size_of;

/// size of a disk sector in bytes
const SECTOR_SIZE: usize = 512;

/// size of a block in bytes
///
/// The superblock records a block size of its own, but every transfer performed here is exactly
/// one sector.
pub const BLOCK_SIZE: usize = SECTOR_SIZE;

pub type Block = [u8; BLOCK_SIZE];
const_assert!(size_of::<Block>() == BLOCK_SIZE);

pub const EMPTY_BLOCK: Block = [0; BLOCK_SIZE];

/// The number of block allocation bits held by one bitmap block.
pub const BITS_PER_BLOCK: usize = BLOCK_SIZE * 8;

// block numbers are represented as `u32`s on the disk, but we use `usize`s to avoid littering
// the code with casts.
pub type BlockNumber = usize;

/// The number of blocks needed to hold `len` bytes.
pub fn blocks_for(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE)
}
