//! Host-side writer for NeeleFS v2 filesystems living inside raw disk images.

pub mod disk_format;
mod error;
pub mod neelefs;
pub mod storage;
#[cfg(test)]
mod testing;

pub use error::{Error, Result};
