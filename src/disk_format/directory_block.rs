use std::mem::size_of;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::{
    block::{Block, BlockNumber, BLOCK_SIZE, EMPTY_BLOCK},
    directory_entry::{DirectoryEntry, EntryName, DIRECTORY_ENTRY_SIZE, NAME_FIELD_SIZE},
};

/// The magic tag of a directory block header (`D2NE` when read little-endian).
pub const DIRECTORY_MAGIC: u32 = 0x454E_3244;

/// The number of bytes occupied by the directory block header.
pub const DIRECTORY_HEADER_SIZE: usize = 16;
const_assert!(size_of::<DirectoryHeader>() == DIRECTORY_HEADER_SIZE);

const_assert!((BLOCK_SIZE - DIRECTORY_HEADER_SIZE) / DIRECTORY_ENTRY_SIZE == 7);
/// The number of entries that fit after the header of a directory block.
pub const ENTRIES_PER_BLOCK: usize = (BLOCK_SIZE - DIRECTORY_HEADER_SIZE) / DIRECTORY_ENTRY_SIZE;

const_assert!(BLOCK_SIZE % DIRECTORY_ENTRY_SIZE == 0);
/// The number of entries in a headerless legacy block.
pub const LEGACY_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIRECTORY_ENTRY_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct DirectoryHeader {
    pub magic: u32,
    /// The next block of the chain, relative to the superblock. Zero ends the chain.
    pub next_block: u32,
    pub entry_size: u16,
    pub entries_per_block: u16,
    pub reserved: u32,
}

impl Default for DirectoryHeader {
    fn default() -> Self {
        Self {
            magic: DIRECTORY_MAGIC,
            next_block: 0,
            entry_size: DIRECTORY_ENTRY_SIZE as u16,
            entries_per_block: ENTRIES_PER_BLOCK as u16,
            reserved: 0,
        }
    }
}

/// A directory block as found on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectoryBlock {
    Modern(ModernBlock),
    Legacy(LegacyBlock),
}

impl DirectoryBlock {
    /// Classifies a raw block by its header magic.
    ///
    /// Fails if the header is present but describes an entry geometry that does not fit in a
    /// block.
    pub fn parse(block_number: BlockNumber, data: Block) -> Result<DirectoryBlock> {
        let header: DirectoryHeader = bincode::deserialize(&data[..DIRECTORY_HEADER_SIZE])?;

        if header.magic != DIRECTORY_MAGIC {
            return Ok(DirectoryBlock::Legacy(LegacyBlock(data)));
        }

        if header.entry_size as usize != DIRECTORY_ENTRY_SIZE
            || header.entries_per_block as usize > ENTRIES_PER_BLOCK
        {
            return Err(crate::Error::corruption(
                block_number,
                format!(
                    "directory header claims {} entries of {} bytes",
                    header.entries_per_block, header.entry_size
                ),
            ));
        }

        Ok(DirectoryBlock::Modern(ModernBlock { header, data }))
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, DirectoryBlock::Legacy(_))
    }

    /// The next block in the chain. Legacy blocks never chain.
    pub fn next_block(&self) -> Option<BlockNumber> {
        match self {
            DirectoryBlock::Modern(block) => block.next_block(),
            DirectoryBlock::Legacy(_) => None,
        }
    }

    /// Byte offsets of every entry slot in the block.
    pub fn slot_offsets(&self) -> impl Iterator<Item = usize> {
        let (base, count) = match self {
            DirectoryBlock::Modern(block) => {
                (DIRECTORY_HEADER_SIZE, block.header.entries_per_block as usize)
            }
            DirectoryBlock::Legacy(_) => (0, LEGACY_ENTRIES_PER_BLOCK),
        };

        (0..count).map(move |i| base + i * DIRECTORY_ENTRY_SIZE)
    }

    /// The name stored in the slot at `offset`.
    pub fn name_at(&self, offset: usize) -> EntryName {
        let mut raw = [0; NAME_FIELD_SIZE];
        raw.copy_from_slice(&self.data()[offset..offset + NAME_FIELD_SIZE]);

        EntryName::from_raw(raw)
    }

    /// Decodes the entry stored in the slot at `offset`.
    pub fn entry_at(&self, offset: usize) -> Result<DirectoryEntry, bincode::Error> {
        bincode::deserialize(&self.data()[offset..offset + DIRECTORY_ENTRY_SIZE])
    }

    /// Overwrites the slot at `offset` with `entry`, keeping the block's layout.
    pub fn write_entry(&mut self, offset: usize, entry: &DirectoryEntry) -> Result<()> {
        match self {
            DirectoryBlock::Modern(block) => block.write_entry(offset, entry),
            DirectoryBlock::Legacy(block) => {
                let slot = &mut block.0[offset..offset + DIRECTORY_ENTRY_SIZE];
                bincode::serialize_into(slot, entry)?;

                Ok(())
            }
        }
    }

    /// The block contents ready to be persisted. Legacy blocks stay headerless.
    pub fn to_block(&self) -> Result<Block> {
        match self {
            DirectoryBlock::Modern(block) => block.to_block(),
            DirectoryBlock::Legacy(block) => Ok(block.0),
        }
    }

    /// Converts the block to the header form, upgrading legacy blocks.
    pub fn into_modern(self) -> ModernBlock {
        match self {
            DirectoryBlock::Modern(block) => block,
            DirectoryBlock::Legacy(block) => block.upgrade(),
        }
    }

    fn data(&self) -> &Block {
        match self {
            DirectoryBlock::Modern(block) => &block.data,
            DirectoryBlock::Legacy(block) => &block.0,
        }
    }
}

/// A block with a directory header; entries start after the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModernBlock {
    header: DirectoryHeader,
    data: Block,
}

impl ModernBlock {
    /// A freshly initialized directory block with every slot free.
    pub fn new() -> ModernBlock {
        ModernBlock {
            header: DirectoryHeader::default(),
            data: EMPTY_BLOCK,
        }
    }

    pub fn header(&self) -> &DirectoryHeader {
        &self.header
    }

    pub fn next_block(&self) -> Option<BlockNumber> {
        match self.header.next_block {
            0 => None,
            next => Some(next as BlockNumber),
        }
    }

    pub fn set_next_block(&mut self, next: BlockNumber) {
        self.header.next_block = next as u32;
    }

    /// The offset of the first slot whose name starts with a nul byte.
    pub fn free_slot(&self) -> Option<usize> {
        (0..self.header.entries_per_block as usize)
            .map(|i| DIRECTORY_HEADER_SIZE + i * DIRECTORY_ENTRY_SIZE)
            .find(|offset| self.data[*offset] == 0)
    }

    /// Overwrites the slot at `offset` with `entry`.
    pub fn write_entry(&mut self, offset: usize, entry: &DirectoryEntry) -> Result<()> {
        bincode::serialize_into(&mut self.data[offset..offset + DIRECTORY_ENTRY_SIZE], entry)?;

        Ok(())
    }

    /// The block contents, header included, ready to be persisted.
    pub fn to_block(&self) -> Result<Block> {
        let mut block = self.data;
        bincode::serialize_into(&mut block[..DIRECTORY_HEADER_SIZE], &self.header)?;

        Ok(block)
    }
}

impl Default for ModernBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// A headerless block interpreted as a flat array of entries starting at byte zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyBlock(Block);

impl LegacyBlock {
    /// Rewrites the block in header form.
    ///
    /// The header replaces the first 16 bytes and the remaining bytes are reinterpreted in place
    /// as the slots of the new layout. Entries of the legacy layout do not survive in any
    /// meaningful way.
    pub fn upgrade(self) -> ModernBlock {
        ModernBlock {
            header: DirectoryHeader::default(),
            data: self.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> DirectoryEntry {
        DirectoryEntry::directory(EntryName::new(name), 42)
    }

    #[test]
    fn test_new_block_header_bytes() {
        let block = ModernBlock::new().to_block().unwrap();

        assert_eq!(&block[0..4], &DIRECTORY_MAGIC.to_le_bytes());
        assert_eq!(&block[0..4], b"D2NE");
        assert_eq!(&block[4..8], &[0; 4]);
        assert_eq!(u16::from_le_bytes([block[8], block[9]]), 64);
        assert_eq!(u16::from_le_bytes([block[10], block[11]]), 7);
        assert!(block[12..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_modern() {
        let mut modern = ModernBlock::new();
        modern.set_next_block(17);
        let block = DirectoryBlock::parse(3, modern.to_block().unwrap()).unwrap();

        assert!(!block.is_legacy());
        assert_eq!(block.next_block(), Some(17));
        assert_eq!(
            block.slot_offsets().collect::<Vec<_>>(),
            vec![16, 80, 144, 208, 272, 336, 400]
        );
    }

    #[test]
    fn test_parse_legacy() {
        let mut raw = EMPTY_BLOCK;
        raw[..5].copy_from_slice(b"hello");
        let block = DirectoryBlock::parse(3, raw).unwrap();

        assert!(block.is_legacy());
        assert_eq!(block.next_block(), None);
        assert_eq!(block.slot_offsets().count(), LEGACY_ENTRIES_PER_BLOCK);
        assert_eq!(block.slot_offsets().next(), Some(0));
        assert_eq!(block.name_at(0), EntryName::new("hello"));
    }

    #[test]
    fn test_parse_rejects_bad_geometry() {
        let mut raw = ModernBlock::new().to_block().unwrap();
        raw[10..12].copy_from_slice(&9u16.to_le_bytes());

        assert!(matches!(
            DirectoryBlock::parse(5, raw),
            Err(crate::Error::Corruption { block: 5, .. })
        ));

        let mut raw = ModernBlock::new().to_block().unwrap();
        raw[8..10].copy_from_slice(&32u16.to_le_bytes());

        assert!(DirectoryBlock::parse(5, raw).is_err());
    }

    #[test]
    fn test_legacy_write_stays_headerless() {
        let mut block = DirectoryBlock::parse(4, EMPTY_BLOCK).unwrap();
        let entry = named("kernel.bin");

        block.write_entry(0, &entry).unwrap();
        block.write_entry(2 * DIRECTORY_ENTRY_SIZE, &entry).unwrap();
        let raw = block.to_block().unwrap();

        assert_eq!(&raw[..10], b"kernel.bin");
        let reparsed = DirectoryBlock::parse(4, raw).unwrap();
        assert!(reparsed.is_legacy());
        assert_eq!(reparsed.entry_at(0).unwrap(), entry);
        assert_eq!(reparsed.entry_at(2 * DIRECTORY_ENTRY_SIZE).unwrap(), entry);
    }

    #[test]
    fn test_upgrade_writes_header_and_keeps_tail() {
        let mut raw = [0xaa; BLOCK_SIZE];
        raw[DIRECTORY_HEADER_SIZE] = 0;

        let upgraded = LegacyBlock(raw).upgrade();
        let block = upgraded.to_block().unwrap();

        assert_eq!(upgraded.header(), &DirectoryHeader::default());
        assert_eq!(&block[..4], b"D2NE");
        assert_eq!(&block[DIRECTORY_HEADER_SIZE + 1..], &raw[DIRECTORY_HEADER_SIZE + 1..]);
        // only the first slot starts with a nul byte
        assert_eq!(upgraded.free_slot(), Some(DIRECTORY_HEADER_SIZE));
    }

    #[test]
    fn test_upgraded_block_parses_as_modern() {
        let upgraded = DirectoryBlock::parse(1, [0x11; BLOCK_SIZE])
            .unwrap()
            .into_modern();
        let reparsed = DirectoryBlock::parse(1, upgraded.to_block().unwrap()).unwrap();

        assert!(!reparsed.is_legacy());
        assert_eq!(reparsed.next_block(), None);
    }

    #[test]
    fn test_free_slot_skips_used_slots() {
        let mut block = ModernBlock::new();
        assert_eq!(block.free_slot(), Some(16));

        block.write_entry(16, &named("a")).unwrap();
        block.write_entry(144, &named("c")).unwrap();
        assert_eq!(block.free_slot(), Some(80));

        for offset in [80, 208, 272, 336, 400] {
            block.write_entry(offset, &named("x")).unwrap();
        }
        assert_eq!(block.free_slot(), None);
    }

    #[test]
    fn test_entry_round_trips_through_block() {
        let entry = DirectoryEntry::file(EntryName::new("boot.cfg"), 77, b"timeout=3");
        let mut modern = ModernBlock::new();
        modern.write_entry(80, &entry).unwrap();

        let block = DirectoryBlock::parse(2, modern.to_block().unwrap()).unwrap();
        assert_eq!(block.entry_at(80).unwrap(), entry);
        assert!(block.name_at(16).is_free());
    }
}
