use thiserror::Error;

use crate::disk_format::block::BlockNumber;

/// Errors produced while reading or mutating a NeeleFS v2 image.
///
/// Every error aborts the requested operation. Blocks written before the failure stay written;
/// nothing is rolled back.
#[derive(Debug, Error)]
pub enum Error {
    /// A sector could not be read or written in full. `block` is the absolute block index.
    #[error("I/O error at absolute block {block}: {source}")]
    Io {
        block: BlockNumber,
        #[source]
        source: std::io::Error,
    },

    /// The superblock sector does not start with `NEELEFS2`.
    #[error("no NeeleFS v2 superblock at LBA {lba}: found magic {found:?}")]
    BadMagic { lba: BlockNumber, found: String },

    /// The superblock is intact but describes a format revision other than 2.
    #[error("unsupported NeeleFS version {version} at LBA {lba} (expected 2)")]
    UnsupportedVersion { lba: BlockNumber, version: u32 },

    /// The stored superblock checksum does not match the sector contents.
    #[error("superblock checksum mismatch at LBA {lba}: stored {stored:#010x}, computed {computed:#010x}")]
    Integrity {
        lba: BlockNumber,
        stored: u32,
        computed: u32,
    },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// No run of `requested` contiguous free blocks exists.
    #[error("no contiguous run of {requested} free block(s)")]
    OutOfSpace { requested: usize },

    /// The directory chain starting at `block` has no free slot and could not be extended.
    #[error("directory at block {block} is full and no block is free to extend it")]
    DirectoryFull { block: BlockNumber },

    /// Metadata that cannot have been produced by a well-behaved writer. `block` is relative to
    /// the superblock.
    #[error("corrupt metadata at block {block}: {detail}")]
    Corruption { block: BlockNumber, detail: String },

    #[error("no such file or directory: {path}")]
    NotFound { path: String },

    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    #[error("not a regular file: {path}")]
    NotAFile { path: String },

    #[error("encoding on-disk structure: {0}")]
    Codec(#[from] bincode::Error),
}

impl Error {
    /// Whether this error means the image is not a usable NeeleFS v2 filesystem at all.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::BadMagic { .. } | Error::UnsupportedVersion { .. }
        )
    }

    pub(crate) fn corruption(block: BlockNumber, detail: impl Into<String>) -> Self {
        Error::Corruption {
            block,
            detail: detail.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
