use crate::disk_format::block::{Block, BlockNumber};
use crate::error::Result;

/// Sector-addressed access to a disk image.
///
/// Block numbers are absolute indices into the image. Implementations must either transfer a
/// whole block or fail with [`crate::Error::Io`].
pub trait BlockStorage {
    fn read_block(&self, block_number: BlockNumber) -> Result<Block>;

    fn write_block(&self, block_number: BlockNumber, block: Block) -> Result<()>;
}

impl<S: BlockStorage + ?Sized> BlockStorage for &S {
    fn read_block(&self, block_number: BlockNumber) -> Result<Block> {
        (**self).read_block(block_number)
    }

    fn write_block(&self, block_number: BlockNumber, block: Block) -> Result<()> {
        (**self).write_block(block_number, block)
    }
}
