use std::collections::HashSet;

use log::{debug, warn};

use crate::{
    disk_format::{
        block::{blocks_for, BlockNumber},
        directory_entry::{DirectoryEntry, EntryType},
    },
    error::Result,
    storage::BlockStorage,
};

use super::{Neelefs, Node};

/// The outcome of [`Neelefs::verify`].
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Every file whose contents were checked, with its path and CRC-32.
    pub checked: Vec<(String, u32)>,
    pub issues: Vec<Issue>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// The stored CRC-32 does not match the file contents.
    ChecksumMismatch { stored: u32, computed: u32 },
    /// A block of the entry's extent or directory chain is free in the bitmap.
    Unallocated { block: BlockNumber },
    /// Two names in the same directory are identical.
    DuplicateName,
    /// A directory that is its own ancestor.
    Loop,
    /// A slot with a name but no type.
    UntypedEntry,
}

impl<S: BlockStorage> Neelefs<S> {
    /// Checks the file at `path`, or every file below the directory at `path`.
    ///
    /// File contents are compared against their stored CRC-32 and every referenced block must be
    /// marked allocated. Problems with individual entries are collected in the report; structural
    /// damage that prevents the walk (unreadable chains, extents outside the filesystem) is
    /// returned as an error.
    pub fn verify(&self, path: &str) -> Result<VerifyReport> {
        let mut report = VerifyReport::default();
        let display = if path.ends_with('/') {
            path.trim_end_matches('/').to_owned()
        } else {
            path.to_owned()
        };

        match self.lookup(path)? {
            Node::File(entry) => self.verify_file(&display, &entry, &mut report)?,
            Node::Directory(block) => {
                let mut ancestors = HashSet::new();
                self.verify_directory(&display, block, &mut ancestors, &mut report)?;
            }
        }

        Ok(report)
    }

    fn verify_directory(
        &self,
        path: &str,
        dir_block: BlockNumber,
        ancestors: &mut HashSet<BlockNumber>,
        report: &mut VerifyReport,
    ) -> Result<()> {
        if !ancestors.insert(dir_block) {
            report.issues.push(Issue {
                path: path.to_owned(),
                kind: IssueKind::Loop,
            });
            return Ok(());
        }

        for block in self.directory_chain(dir_block)? {
            self.check_allocated(path, block, 1, report)?;
        }

        let mut names = HashSet::new();
        for entry in self.read_directory(dir_block)? {
            let child = format!("{path}/{}", entry.name);

            if !names.insert(entry.name) {
                report.issues.push(Issue {
                    path: child.clone(),
                    kind: IssueKind::DuplicateName,
                });
            }

            match entry.type_ {
                EntryType::File => self.verify_file(&child, &entry, report)?,
                EntryType::Directory => {
                    self.verify_directory(&child, entry.block_number(), ancestors, report)?
                }
                EntryType::Free => report.issues.push(Issue {
                    path: child,
                    kind: IssueKind::UntypedEntry,
                }),
            }
        }

        ancestors.remove(&dir_block);
        Ok(())
    }

    fn verify_file(
        &self,
        path: &str,
        entry: &DirectoryEntry,
        report: &mut VerifyReport,
    ) -> Result<()> {
        let data = self.read_extent(entry)?;
        let computed = crc32fast::hash(&data);

        if computed == entry.checksum {
            debug!("{path}: ok ({} bytes, crc32 {computed:#010x})", entry.size);
        } else {
            warn!(
                "{path}: checksum mismatch (stored {:#010x}, computed {computed:#010x})",
                entry.checksum
            );
            report.issues.push(Issue {
                path: path.to_owned(),
                kind: IssueKind::ChecksumMismatch {
                    stored: entry.checksum,
                    computed,
                },
            });
        }

        self.check_allocated(path, entry.block_number(), blocks_for(data.len()), report)?;
        report.checked.push((path.to_owned(), computed));

        Ok(())
    }

    fn check_allocated(
        &self,
        path: &str,
        start: BlockNumber,
        count: usize,
        report: &mut VerifyReport,
    ) -> Result<()> {
        for block in start..start + count {
            if !self.bit_get(block)? {
                report.issues.push(Issue {
                    path: path.to_owned(),
                    kind: IssueKind::Unallocated { block },
                });
            }
        }

        Ok(())
    }
}
