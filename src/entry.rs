//! On-disk directory entry format and the codec that validates it.
//!
//! A directory is a flat byte buffer (one or more blocks, concatenated).
//! Each entry is a fixed 8-byte header followed by `name_len` bytes of name,
//! padded up to a `PAD`-byte boundary. `rec_len` is the distance to the next
//! entry; the last entry in a block has `rec_len` reaching the block's end.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::DirError;
use crate::geometry::DirGeometry;

/// Raw, fixed-size entry header as it appears on disk.
///
/// All four fields are naturally aligned within the 8-byte header (u32 at
/// offset 0, u16 at offset 4, two u8s at 6 and 7), so no `packed` repr is
/// needed; entries themselves only ever start at `PAD`-aligned offsets.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct EntryHeader {
    pub ino: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: u8,
}

/// A decoded, validated view of one on-disk entry.
///
/// Borrows from the block buffer it was decoded from; carries no owned data.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    /// Byte offset of this entry within its block.
    pub offset: usize,
    pub ino: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: u8,
    pub name: &'a [u8],
}

impl<'a> Entry<'a> {
    /// Whether this slot is free (`ino == 0`).
    pub fn is_free(&self) -> bool {
        self.ino == 0
    }

    /// The minimum record length this entry's name actually needs, i.e. the
    /// length it would have after a Shrink/Compress.
    pub fn min_rec(&self, geom: &DirGeometry) -> usize {
        geom.min_rec(self.name_len as usize)
    }

    /// Free bytes within this entry available to a new insertion: the whole
    /// record if the slot is free, or the trailing slack past `min_rec` if
    /// it is occupied.
    pub fn free_space(&self, geom: &DirGeometry) -> usize {
        if self.is_free() {
            self.rec_len as usize
        } else {
            self.rec_len as usize - self.min_rec(geom)
        }
    }
}

/// Decode and validate the entry at `offset` within `block`.
///
/// Enforces every invariant in §3: `rec_len` nonzero, `PAD`-aligned, and not
/// overrunning the block; `name_len` within `NAME_MAX` and consistent with
/// `rec_len`; no embedded NUL in the name. Any violation is reported as
/// [`DirError::Corrupt`] — callers are expected to treat that as "this block
/// is bad," not propagate it as a hard failure (lookup) or do so only when
/// they have no fallback (readdir).
pub fn decode<'a>(block: &'a [u8], offset: usize, geom: &DirGeometry) -> Result<Entry<'a>, DirError> {
    let header_size = geom.header_size() as usize;
    if offset + header_size > block.len() {
        return Err(DirError::Corrupt);
    }

    let (header, _) = EntryHeader::read_from_prefix(&block[offset..]).map_err(|_| DirError::Corrupt)?;

    let rec_len = header.rec_len as usize;
    if rec_len == 0 || rec_len % geom.pad() as usize != 0 || offset + rec_len > block.len() {
        return Err(DirError::Corrupt);
    }

    let name_len = header.name_len as usize;
    if name_len > geom.name_max() as usize || geom.min_rec(name_len) > rec_len {
        return Err(DirError::Corrupt);
    }

    let name_start = offset + header_size;
    let name = &block[name_start..name_start + name_len];
    if name.contains(&0) {
        return Err(DirError::Corrupt);
    }

    Ok(Entry {
        offset,
        ino: header.ino,
        rec_len: header.rec_len,
        name_len: header.name_len,
        file_type: header.file_type,
        name,
    })
}

/// Write a complete entry (header, name, and zero-filled padding) into
/// `block` at `offset`. `rec_len` is the caller's choice — it may exceed
/// `min_rec(name.len())`, leaving trailing slack for a future Shrink.
///
/// Padding between the end of the name and the next `PAD` boundary is always
/// zeroed, so a later scan never mistakes leftover bytes from a previous,
/// longer name for part of this one.
pub fn write_entry(
    block: &mut [u8],
    offset: usize,
    ino: u32,
    rec_len: u16,
    name: &[u8],
    file_type: u8,
    geom: &DirGeometry,
) {
    let header = EntryHeader {
        ino,
        rec_len,
        name_len: name.len() as u8,
        file_type,
    };
    let header_size = geom.header_size() as usize;
    header
        .write_to_prefix(&mut block[offset..])
        .expect("entry header fits within its record");

    let name_start = offset + header_size;
    block[name_start..name_start + name.len()].copy_from_slice(name);

    let padded_end = offset + geom.min_rec(name.len());
    let name_end = name_start + name.len();
    let record_end = offset + rec_len as usize;
    if padded_end > name_end && padded_end <= record_end {
        block[name_end..padded_end].fill(0);
    }
}

/// Set just the `ino` field of the entry at `offset` (used by Remove's
/// tombstone case and Rewrite).
pub fn set_ino(block: &mut [u8], offset: usize, ino: u32) {
    block[offset..offset + 4].copy_from_slice(&ino.to_le_bytes());
}

/// Set just the `rec_len` field of the entry at `offset` (used by Shrink,
/// Compress, and Remove's merge case).
pub fn set_rec_len(block: &mut [u8], offset: usize, rec_len: u16) {
    block[offset + 4..offset + 6].copy_from_slice(&rec_len.to_le_bytes());
}

/// Set just the `file_type` field of the entry at `offset` (used by Rewrite).
pub fn set_file_type(block: &mut [u8], offset: usize, file_type: u8) {
    block[offset + 7] = file_type;
}
