use std::mem::size_of;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::block::{Block, BlockNumber, BITS_PER_BLOCK, EMPTY_BLOCK};

/// The magic tag at the start of every NeeleFS v2 superblock.
pub const SUPERBLOCK_MAGIC: [u8; 8] = *b"NEELEFS2";

/// The only format revision this crate reads or writes.
pub const FORMAT_VERSION: u32 = 2;

/// The block index at which the boot environment looks for NeeleFS by default.
pub const DEFAULT_LBA: BlockNumber = 2048;

/// The number of bytes occupied by the superblock header at the start of its sector.
pub const SUPERBLOCK_SIZE: usize = 32;
const_assert!(size_of::<SuperblockHeader>() == SUPERBLOCK_SIZE);

/// Byte offset of the checksum field. The checksum covers the whole sector with these four bytes
/// zeroed.
pub const CHECKSUM_OFFSET: usize = 28;

/// The superblock as laid out on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct SuperblockHeader {
    pub magic: [u8; 8],
    pub version: u32,
    /// Informational only.
    pub block_size: u16,
    pub padding: u16,
    pub total_blocks: u32,
    /// First bitmap block, relative to the superblock.
    pub bitmap_start: u32,
    /// First block of the root directory, relative to the superblock.
    pub root_block: u32,
    pub checksum: u32,
}

impl SuperblockHeader {
    /// Serializes the header into a zero-filled sector and stores its checksum.
    pub fn seal(mut self) -> Result<Block> {
        let mut sector = EMPTY_BLOCK;

        self.checksum = 0;
        bincode::serialize_into(&mut sector[..SUPERBLOCK_SIZE], &self)?;

        let checksum = sector_checksum(&sector);
        sector[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());

        Ok(sector)
    }
}

/// Computes the CRC-32 of a superblock sector as if its checksum field were zero.
pub fn sector_checksum(sector: &Block) -> u32 {
    let mut zeroed = *sector;
    zeroed[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].fill(0);

    crc32fast::hash(&zeroed)
}

/// A validated superblock together with the LBA it was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Superblock {
    pub lba: BlockNumber,
    pub block_size: u16,
    pub total_blocks: usize,
    pub bitmap_start: BlockNumber,
    pub root_block: BlockNumber,
}

impl Superblock {
    /// Parses and validates the superblock sector read from `lba`.
    ///
    /// Checks are performed in order: magic, checksum, version.
    pub fn parse(lba: BlockNumber, sector: &Block) -> Result<Superblock> {
        if sector[..SUPERBLOCK_MAGIC.len()] != SUPERBLOCK_MAGIC {
            return Err(Error::BadMagic {
                lba,
                found: String::from_utf8_lossy(&sector[..SUPERBLOCK_MAGIC.len()]).into_owned(),
            });
        }

        let header: SuperblockHeader = bincode::deserialize(&sector[..SUPERBLOCK_SIZE])?;

        let computed = sector_checksum(sector);
        if header.checksum != computed {
            return Err(Error::Integrity {
                lba,
                stored: header.checksum,
                computed,
            });
        }

        if header.version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion {
                lba,
                version: header.version,
            });
        }

        Ok(Superblock {
            lba,
            block_size: header.block_size,
            total_blocks: header.total_blocks as usize,
            bitmap_start: header.bitmap_start as BlockNumber,
            root_block: header.root_block as BlockNumber,
        })
    }

    /// The number of blocks the bitmap occupies.
    pub fn bitmap_blocks(&self) -> usize {
        self.total_blocks.div_ceil(BITS_PER_BLOCK)
    }

    /// The first block the allocator may hand out. Everything before it (the superblock, the
    /// bitmap) is implicitly reserved.
    pub fn first_allocatable_block(&self) -> BlockNumber {
        self.bitmap_start + self.bitmap_blocks()
    }

    /// Translates a block index relative to the superblock into an absolute one.
    pub fn absolute(&self, block: BlockNumber) -> BlockNumber {
        self.lba + block
    }
}

#[cfg(test)]
mod tests {
    use crate::disk_format::block::BLOCK_SIZE;

    use super::*;

    fn header() -> SuperblockHeader {
        SuperblockHeader {
            magic: SUPERBLOCK_MAGIC,
            version: FORMAT_VERSION,
            block_size: BLOCK_SIZE as u16,
            padding: 0,
            total_blocks: 8192,
            bitmap_start: 1,
            root_block: 3,
            checksum: 0,
        }
    }

    #[test]
    fn test_field_offsets() {
        let sector = header().seal().unwrap();

        assert_eq!(&sector[0..8], b"NEELEFS2");
        assert_eq!(u32::from_le_bytes(sector[8..12].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(sector[12..14].try_into().unwrap()), 512);
        assert_eq!(u32::from_le_bytes(sector[16..20].try_into().unwrap()), 8192);
        assert_eq!(u32::from_le_bytes(sector[20..24].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(sector[24..28].try_into().unwrap()), 3);
        assert!(sector[SUPERBLOCK_SIZE..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_sealed_superblock_parses() {
        let sector = header().seal().unwrap();
        let superblock = Superblock::parse(7, &sector).unwrap();

        assert_eq!(superblock.lba, 7);
        assert_eq!(superblock.block_size, 512);
        assert_eq!(superblock.total_blocks, 8192);
        assert_eq!(superblock.bitmap_start, 1);
        assert_eq!(superblock.root_block, 3);
        assert_eq!(superblock.bitmap_blocks(), 2);
        assert_eq!(superblock.first_allocatable_block(), 3);
        assert_eq!(superblock.absolute(3), 10);
    }

    #[test]
    fn test_checksum_matches_crc32_of_zeroed_sector() {
        let sector = header().seal().unwrap();
        let stored = u32::from_le_bytes(sector[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].try_into().unwrap());

        let mut zeroed = sector;
        zeroed[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].fill(0);

        assert_eq!(stored, crc32fast::hash(&zeroed));
    }

    #[test]
    fn test_any_flipped_bit_is_rejected() {
        let sector = header().seal().unwrap();

        // every bit outside the magic and the checksum field itself
        for byte in SUPERBLOCK_MAGIC.len()..BLOCK_SIZE {
            if (CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4).contains(&byte) {
                continue;
            }

            for bit in 0..8 {
                let mut corrupted = sector;
                corrupted[byte] ^= 1 << bit;

                assert!(
                    matches!(
                        Superblock::parse(0, &corrupted),
                        Err(Error::Integrity { .. })
                    ),
                    "flipping bit {bit} of byte {byte} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn test_flipped_checksum_bit_is_rejected() {
        let mut sector = header().seal().unwrap();
        sector[CHECKSUM_OFFSET + 2] ^= 0x10;

        assert!(matches!(
            Superblock::parse(0, &sector),
            Err(Error::Integrity { .. })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut sector = header().seal().unwrap();
        sector[..8].copy_from_slice(b"NEELEFS1");

        let err = Superblock::parse(2048, &sector).unwrap_err();
        assert!(err.is_format_error());
        assert!(matches!(err, Error::BadMagic { lba: 2048, ref found } if found == "NEELEFS1"));
    }

    #[test]
    fn test_unsupported_version() {
        let sector = SuperblockHeader {
            version: 3,
            ..header()
        }
        .seal()
        .unwrap();

        assert!(matches!(
            Superblock::parse(0, &sector),
            Err(Error::UnsupportedVersion { version: 3, .. })
        ));
    }

    #[test]
    fn test_checksum_is_checked_before_version() {
        let mut sector = SuperblockHeader {
            version: 1,
            ..header()
        }
        .seal()
        .unwrap();
        sector[100] = 0xff;

        assert!(matches!(
            Superblock::parse(0, &sector),
            Err(Error::Integrity { .. })
        ));
    }
}
