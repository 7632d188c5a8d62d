use log::info;

use crate::{
    disk_format::{
        block::BlockNumber,
        directory_entry::{DirectoryEntry, EntryName},
    },
    error::{Error, Result},
    storage::BlockStorage,
};

use super::Neelefs;

/// What an absolute path refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// A directory, identified by the first block of its chain. The root has no entry of its
    /// own, so this carries only the block.
    Directory(BlockNumber),
    File(DirectoryEntry),
}

/// Splits an absolute path into its non-empty components.
fn components(path: &str) -> Result<Vec<&str>> {
    if !path.starts_with('/') {
        return Err(Error::InvalidPath {
            path: path.to_owned(),
            reason: "path must start with '/'",
        });
    }

    Ok(path.split('/').filter(|c| !c.is_empty()).collect())
}

impl<S: BlockStorage> Neelefs<S> {
    /// Walks `path` down to its last component, creating every missing intermediate directory.
    ///
    /// Returns the directory block that should hold the last component, and that component.
    /// A path with no components yields the root directory and an empty name.
    ///
    /// Existing intermediate entries are descended into without looking at their type: a file
    /// entry in the middle of a path is treated as if its extent were a directory.
    pub fn resolve_parent(&mut self, path: &str) -> Result<(BlockNumber, String)> {
        let components = components(path)?;
        let mut dir_block = self.superblock.root_block;

        let Some((leaf, intermediate)) = components.split_last() else {
            return Ok((dir_block, String::new()));
        };

        for component in intermediate {
            dir_block = match self.find_entry(dir_block, &EntryName::new(component))? {
                Some(found) => found.entry.block_number(),
                None => self.create_directory(dir_block, component)?,
            };
        }

        Ok((dir_block, (*leaf).to_owned()))
    }

    /// Creates the directory at `path` and any missing parents. Existing directories are left as
    /// they are.
    ///
    /// Returns the first block of the directory's chain.
    pub fn mkdir(&mut self, path: &str) -> Result<BlockNumber> {
        let mut dir_block = self.superblock.root_block;
        let mut walked = String::new();

        for component in components(path)? {
            walked.push('/');
            walked.push_str(component);

            dir_block = match self.find_entry(dir_block, &EntryName::new(component))? {
                Some(found) if found.entry.is_directory() => found.entry.block_number(),
                Some(_) => return Err(Error::NotADirectory { path: walked }),
                None => self.create_directory(dir_block, component)?,
            };
        }

        Ok(dir_block)
    }

    /// Resolves `path` without modifying anything.
    pub fn lookup(&self, path: &str) -> Result<Node> {
        let mut node = Node::Directory(self.superblock.root_block);
        let mut walked = String::new();

        for component in components(path)? {
            let Node::Directory(dir_block) = node else {
                return Err(Error::NotADirectory { path: walked });
            };

            walked.push('/');
            walked.push_str(component);

            let found = self
                .find_entry(dir_block, &EntryName::new(component))?
                .ok_or_else(|| Error::NotFound {
                    path: walked.clone(),
                })?;

            node = if found.entry.is_directory() {
                Node::Directory(found.entry.block_number())
            } else {
                Node::File(found.entry)
            };
        }

        Ok(node)
    }

    /// Lists the live entries of the directory at `path`.
    pub fn list_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        match self.lookup(path)? {
            Node::Directory(dir_block) => self.read_directory(dir_block),
            Node::File(_) => Err(Error::NotADirectory {
                path: path.to_owned(),
            }),
        }
    }

    /// Allocates and initializes a directory block and links it into `parent` under `name`.
    fn create_directory(&mut self, parent: BlockNumber, name: &str) -> Result<BlockNumber> {
        let block = self
            .allocate_contiguous(1)?
            .ok_or(Error::OutOfSpace { requested: 1 })?;
        self.init_directory_block(block)?;

        self.add_entry(parent, &DirectoryEntry::directory(EntryName::new(name), block))?;

        info!("created directory {name:?} at block {block} in directory {parent}");
        Ok(block)
    }
}
