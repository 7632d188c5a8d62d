/// Perform a const assertion.
macro_rules! const_assert {
    ($($tt:tt)*) => {
        const _: () = assert!($($tt)*);
    }
}

/// NeeleFS blocks.
pub mod block;
/// Directory blocks: the chained header form and the headerless legacy form.
pub mod directory_block;
/// Directory entries and entry names.
pub mod directory_entry;
/// The filesystem superblock.
pub mod superblock;
