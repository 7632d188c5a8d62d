//! Fixtures shared by the unit tests.

use bitvec::{order::Lsb0, view::BitView};

use crate::{
    disk_format::{
        block::{BlockNumber, BITS_PER_BLOCK, BLOCK_SIZE, EMPTY_BLOCK},
        directory_block::ModernBlock,
        superblock::{SuperblockHeader, FORMAT_VERSION, SUPERBLOCK_MAGIC},
    },
    neelefs::Neelefs,
    storage::{BlockStorage, MemoryStorage},
};

/// Where test filesystems are placed inside their image.
pub(crate) const TEST_LBA: BlockNumber = 4;

/// Lays out an empty filesystem of `total_blocks` blocks at `lba`: superblock, bitmap right after
/// it, then the root directory. Blocks up to and including the root are marked allocated.
pub(crate) fn format<S: BlockStorage>(storage: &S, lba: BlockNumber, total_blocks: usize) {
    let bitmap_start = 1;
    let bitmap_blocks = total_blocks.div_ceil(BITS_PER_BLOCK);
    let root_block = bitmap_start + bitmap_blocks;

    let header = SuperblockHeader {
        magic: SUPERBLOCK_MAGIC,
        version: FORMAT_VERSION,
        block_size: BLOCK_SIZE as u16,
        padding: 0,
        total_blocks: total_blocks as u32,
        bitmap_start: bitmap_start as u32,
        root_block: root_block as u32,
        checksum: 0,
    };
    storage.write_block(lba, header.seal().unwrap()).unwrap();

    for i in 0..bitmap_blocks {
        let mut sector = EMPTY_BLOCK;
        let bits = sector.view_bits_mut::<Lsb0>();

        for block in 0..=root_block {
            if block / BITS_PER_BLOCK == i {
                bits.set(block % BITS_PER_BLOCK, true);
            }
        }

        storage
            .write_block(lba + bitmap_start + i, sector)
            .unwrap();
    }

    storage
        .write_block(lba + root_block, ModernBlock::new().to_block().unwrap())
        .unwrap();
}

/// A freshly formatted in-memory filesystem of `total_blocks` blocks at [`TEST_LBA`].
pub(crate) fn formatted(total_blocks: usize) -> Neelefs<MemoryStorage> {
    let storage = MemoryStorage::new(TEST_LBA + total_blocks);
    format(&storage, TEST_LBA, total_blocks);

    Neelefs::open(storage, TEST_LBA).unwrap()
}
