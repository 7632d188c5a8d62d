use std::{
    fmt::{self, Debug},
    mem::size_of,
};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::block::BlockNumber;

/// The number of bytes occupied by a directory entry.
pub const DIRECTORY_ENTRY_SIZE: usize = 64;
const_assert!(size_of::<DirectoryEntry>() == DIRECTORY_ENTRY_SIZE);

/// The size of the name field, including room for at least one nul byte.
pub const NAME_FIELD_SIZE: usize = 32;
const_assert!(size_of::<EntryName>() == NAME_FIELD_SIZE);

/// The maximum number of name bytes stored, excluding the nul-terminator.
pub const MAX_NAME_LEN: usize = NAME_FIELD_SIZE - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum EntryType {
    /// Never written by this crate; only seen in unused slots.
    Free = 0,
    File = 1,
    Directory = 2,
}

/// A directory entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct DirectoryEntry {
    pub name: EntryName,
    pub type_: EntryType,
    pub padding: [u8; 3],
    /// First block of the file extent or of the subdirectory chain, relative to the superblock.
    pub block: u32,
    /// File size in bytes. Zero for directories.
    pub size: u32,
    /// CRC-32 of the file contents. Zero for directories.
    pub checksum: u32,
    /// Modification time. Left zero.
    pub mtime: u32,
    pub reserved: [u8; 12],
}

impl DirectoryEntry {
    /// Constructs a file entry describing `data` stored at `block`.
    pub fn file(name: EntryName, block: BlockNumber, data: &[u8]) -> DirectoryEntry {
        DirectoryEntry {
            type_: EntryType::File,
            block: block as u32,
            size: data.len() as u32,
            checksum: crc32fast::hash(data),
            ..Self::empty(name)
        }
    }

    /// Constructs an entry for the subdirectory whose chain starts at `block`.
    pub fn directory(name: EntryName, block: BlockNumber) -> DirectoryEntry {
        DirectoryEntry {
            type_: EntryType::Directory,
            block: block as u32,
            ..Self::empty(name)
        }
    }

    fn empty(name: EntryName) -> DirectoryEntry {
        DirectoryEntry {
            name,
            type_: EntryType::Free,
            padding: [0; 3],
            block: 0,
            size: 0,
            checksum: 0,
            mtime: 0,
            reserved: [0; 12],
        }
    }

    pub fn is_directory(&self) -> bool {
        self.type_ == EntryType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.type_ == EntryType::File
    }

    pub fn block_number(&self) -> BlockNumber {
        self.block as BlockNumber
    }
}

/// A name, as used in [`DirectoryEntry`].
///
/// Names are stored as raw UTF-8 bytes, truncated to [`MAX_NAME_LEN`] bytes and nul-padded.
/// Comparison is byte-for-byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct EntryName([u8; NAME_FIELD_SIZE]);

impl EntryName {
    /// Encodes `name`, silently dropping bytes past [`MAX_NAME_LEN`].
    pub fn new(name: &str) -> EntryName {
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_NAME_LEN);

        let mut converted = [0; NAME_FIELD_SIZE];
        converted[..len].copy_from_slice(&bytes[..len]);

        EntryName(converted)
    }

    /// Wraps a raw name field read from disk.
    pub fn from_raw(raw: [u8; NAME_FIELD_SIZE]) -> EntryName {
        EntryName(raw)
    }

    pub fn as_bytes(&self) -> &[u8; NAME_FIELD_SIZE] {
        &self.0
    }

    /// The name bytes up to the first nul.
    pub fn trimmed(&self) -> &[u8] {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(NAME_FIELD_SIZE);
        &self.0[..end]
    }

    /// Whether the slot holding this name is free.
    pub fn is_free(&self) -> bool {
        self.0[0] == 0
    }
}

impl Debug for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryName")
            .field(&String::from_utf8_lossy(self.trimmed()))
            .finish()
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.trimmed()))
    }
}
