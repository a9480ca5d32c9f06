//! Traits naming the collaborators this engine consumes but does not
//! implement: the inode cache and the file-data (mapped read/write window)
//! layer. Both are out of scope for this crate — named here by contract
//! only, the way a `BlockDevice` trait names the seam between an ext2
//! driver and whatever transport backs it, without the driver implementing
//! that transport itself.

use crate::error::DirError;

/// Identifies a resolved filesystem node (an inode handle).
///
/// The distilled interface calls for explicit `ref`/`release`/
/// `release_without_lock` operations on inode-cache results; this crate
/// folds those into ordinary `Clone`/`Drop` on the handle type instead; a
/// reference-counted handle (e.g. `Arc<Inode>`) already behaves exactly
/// like "take a reference" / "drop a reference" without a separate API.
pub trait NodeHandle: Clone {
    /// This node's own inode number.
    fn inum(&self) -> u32;
}

/// Protection requested for a mapped directory window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapProt {
    ReadOnly,
    ReadWrite,
}

/// An owned, in-memory mirror of a directory's on-disk bytes.
///
/// Produced by [`FileData::map`] and consumed by [`FileData::unmap`]. While
/// held, it is mutated in place by the block scanner and mutators; `unmap`
/// is responsible for writing any changes back through the real storage
/// layer (analogous to `munmap`/`msync` on a `MAP_SHARED` mapping).
#[derive(Debug, Clone)]
pub struct MappedWindow {
    pub data: Vec<u8>,
}

impl MappedWindow {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// The file-data layer: mapped read/write windows over a node's byte range,
/// plain reads, and growth.
pub trait FileData<N: NodeHandle> {
    /// Map `len` bytes of `node`'s data under `prot`.
    fn map(&self, node: &N, len: u64, prot: MapProt) -> Result<MappedWindow, DirError>;

    /// Release a previously mapped window, writing back any modifications.
    fn unmap(&self, node: &N, window: MappedWindow) -> Result<(), DirError>;

    /// Read `buf.len()` bytes from `node` starting at `offset`, without a
    /// mapped window. Returns the number of bytes actually read.
    fn read(&self, node: &N, buf: &mut [u8], offset: u64) -> Result<usize, DirError>;

    /// Grow `node`'s size to at least `new_size`. May allocate in smaller
    /// increments than requested; callers loop, re-checking [`FileData::size`]
    /// between calls, until the size is reached.
    fn grow(&self, node: &N, new_size: u64) -> Result<(), DirError>;

    /// `node`'s current size in bytes, as actually allocated by storage.
    /// Used after [`FileData::grow`] to learn how much of a requested growth
    /// actually landed.
    fn size(&self, node: &N) -> Result<u64, DirError>;

    /// Flush `node`'s metadata (mtime/ctime/atime/size) to storage.
    /// `wait` requests the write complete synchronously before returning.
    fn update_metadata(&self, node: &N, wait: bool) -> Result<(), DirError>;
}

/// The inode cache: resolves inode numbers to node handles.
pub trait InodeCache<N: NodeHandle> {
    /// Resolve `inum` to a node handle, loading it from storage if not
    /// already resident. May block.
    fn cached_lookup(&self, inum: u32) -> Result<N, DirError>;

    /// Resolve `inum` to a node handle only if it is already resident.
    /// Never blocks, never touches storage.
    fn find_if_cached(&self, inum: u32) -> Option<N>;
}
