use log::info;

use crate::{
    disk_format::{
        block::{Block, BlockNumber},
        superblock::Superblock,
    },
    error::{Error, Result},
    storage::BlockStorage,
};

/// Block allocation bitmap.
mod bitmap;
/// Directory chains: lookup, insertion, listing.
mod directory;
/// File contents: writing and reading extents.
mod file;
/// Path resolution.
mod path;
/// Integrity verification.
mod verify;

pub use directory::FoundEntry;
pub use path::Node;
pub use verify::{Issue, IssueKind, VerifyReport};

/// Reads and validates the superblock at absolute block `lba`.
pub fn load_superblock<S: BlockStorage>(storage: &S, lba: BlockNumber) -> Result<Superblock> {
    let sector = storage.read_block(lba)?;

    Superblock::parse(lba, &sector)
}

/// A NeeleFS v2 filesystem inside a disk image.
///
/// Nothing is cached: every operation reads the blocks it needs from `storage` and writes back
/// every block it changes before returning.
pub struct Neelefs<S: BlockStorage> {
    pub storage: S,
    superblock: Superblock,
}

impl<S: BlockStorage> Neelefs<S> {
    /// Opens the filesystem whose superblock lives at absolute block `lba`.
    pub fn open(storage: S, lba: BlockNumber) -> Result<Self> {
        let superblock = load_superblock(&storage, lba)?;

        info!(
            "NeeleFS v2 at LBA {lba}: {} blocks, bitmap at {}, root directory at {}",
            superblock.total_blocks, superblock.bitmap_start, superblock.root_block
        );

        Ok(Self {
            storage,
            superblock,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Reads a block addressed relative to the superblock.
    fn read_block(&self, block_number: BlockNumber) -> Result<Block> {
        self.check_in_bounds(block_number)?;
        self.storage
            .read_block(self.superblock.absolute(block_number))
    }

    /// Writes a block addressed relative to the superblock.
    fn write_block(&self, block_number: BlockNumber, block: Block) -> Result<()> {
        self.check_in_bounds(block_number)?;
        self.storage
            .write_block(self.superblock.absolute(block_number), block)
    }

    fn check_in_bounds(&self, block_number: BlockNumber) -> Result<()> {
        if block_number >= self.superblock.total_blocks {
            return Err(Error::corruption(
                block_number,
                format!(
                    "block lies outside the filesystem ({} blocks)",
                    self.superblock.total_blocks
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        disk_format::{
            block::{BLOCK_SIZE, EMPTY_BLOCK},
            superblock::SuperblockHeader,
        },
        storage::{FileBackedStorage, MemoryStorage},
        testing::{format, TEST_LBA},
    };

    use super::*;

    #[test]
    fn test_open_formatted_image() {
        let storage = MemoryStorage::new(TEST_LBA + 64);
        format(&storage, TEST_LBA, 64);

        let fs = Neelefs::open(storage, TEST_LBA).unwrap();
        let superblock = fs.superblock();

        assert_eq!(superblock.lba, TEST_LBA);
        assert_eq!(superblock.total_blocks, 64);
        assert_eq!(superblock.bitmap_start, 1);
        assert_eq!(superblock.root_block, 2);
    }

    #[test]
    fn test_open_at_wrong_lba() {
        let storage = MemoryStorage::new(TEST_LBA + 64);
        format(&storage, TEST_LBA, 64);

        let err = Neelefs::open(&storage, 0).err().unwrap();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_open_truncated_image() {
        let storage = MemoryStorage::new(TEST_LBA);

        assert!(matches!(
            Neelefs::open(storage, TEST_LBA),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_open_corrupted_superblock() {
        let storage = MemoryStorage::new(TEST_LBA + 64);
        format(&storage, TEST_LBA, 64);

        let mut sector = storage.read_block(TEST_LBA).unwrap();
        sector[20] ^= 0x01;
        storage.write_block(TEST_LBA, sector).unwrap();

        assert!(matches!(
            Neelefs::open(storage, TEST_LBA),
            Err(Error::Integrity { .. })
        ));
    }

    #[test]
    fn test_load_superblock_has_no_side_effects() {
        let storage = MemoryStorage::new(TEST_LBA + 64);
        format(&storage, TEST_LBA, 64);
        let before = storage.into_blocks();

        let storage = MemoryStorage::from_blocks(before.clone());
        load_superblock(&storage, TEST_LBA).unwrap();

        assert_eq!(storage.into_blocks(), before);
    }

    #[test]
    fn test_blocks_outside_filesystem_are_rejected() {
        let storage = MemoryStorage::new(TEST_LBA + 64);
        format(&storage, TEST_LBA, 32);
        let fs = Neelefs::open(storage, TEST_LBA).unwrap();

        assert!(fs.read_block(31).is_ok());
        assert!(matches!(
            fs.read_block(32),
            Err(Error::Corruption { block: 32, .. })
        ));
        assert!(fs.write_block(40, EMPTY_BLOCK).is_err());
    }

    #[test]
    fn test_put_survives_reopening_file_image() {
        let file = tempfile::tempfile().unwrap();
        file.set_len(((TEST_LBA + 64) * BLOCK_SIZE) as u64).unwrap();

        let storage = FileBackedStorage::new(file);
        format(&storage, TEST_LBA, 64);

        let mut fs = Neelefs::open(storage, TEST_LBA).unwrap();
        fs.put_file(b"abc", "/docs/readme.txt").unwrap();
        let file = fs.into_storage().into_inner();

        let fs = Neelefs::open(FileBackedStorage::new(file), TEST_LBA).unwrap();
        assert_eq!(fs.read_file("/docs/readme.txt").unwrap(), b"abc");
        assert!(fs.verify("/").unwrap().is_clean());
    }

    #[test]
    fn test_version_one_superblock() {
        let storage = MemoryStorage::new(TEST_LBA + 64);
        format(&storage, TEST_LBA, 64);

        let sector = storage.read_block(TEST_LBA).unwrap();
        let mut header: SuperblockHeader = bincode::deserialize(&sector[..32]).unwrap();
        header.version = 1;
        storage
            .write_block(TEST_LBA, header.seal().unwrap())
            .unwrap();

        assert!(matches!(
            Neelefs::open(storage, TEST_LBA),
            Err(Error::UnsupportedVersion { version: 1, .. })
        ));
    }
}
