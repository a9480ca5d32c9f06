//! Lookup-result tokens: the mapped window a lookup produced, together with
//! enough information for a mutator to finish the job without re-scanning.

use crate::contracts::MappedWindow;

/// How a new entry should be written into a directory, chosen during the
/// scan that failed to find an existing entry with the wanted name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Write into an entirely free slot (`ino == 0`) that's already big
    /// enough.
    Take,
    /// Split a live entry's trailing slack off into a new free slot.
    Shrink,
    /// Repack a whole block in place, coalescing every entry's slack into
    /// one slot at the end, then use that slot.
    Compress,
    /// No existing block can take the entry; grow the directory by one
    /// block and use all of it.
    Extend,
}

/// What a completed scan found, and what a mutator should do about it.
#[derive(Debug, Clone)]
pub enum TokenKind {
    /// An entry with the wanted name exists.
    Found {
        block_idx: usize,
        entry_off: usize,
        /// Offset of the entry immediately before this one in the same
        /// block, if any — Remove merges a tombstone into its predecessor's
        /// `rec_len` when present.
        prev_entry_off: Option<usize>,
        ino: u32,
        file_type: u8,
    },
    /// No entry with the wanted name exists; here is where a new one goes.
    Create {
        strategy: Strategy,
        block_idx: usize,
        /// For Take/Shrink, the offset of the slot to write into. For
        /// Compress, the start of the block (the repack always lands the
        /// new slot there). Unused (0) for Extend, which always targets a
        /// freshly allocated block's offset 0.
        anchor_off: usize,
    },
}

/// The mapped bytes a scan walked, plus what it found, kept alive until a
/// mutator consumes it.
///
/// This is this crate's answer to "a lookup result that owns a locked,
/// mapped window until the matching mutation runs": instead of a separate
/// lock handle, the token owns the only copy of the window, so nothing else
/// can observe or race with it. It does not carry a resolved node handle —
/// the mutators (enter/remove/rewrite) never need one, only a position and
/// an inode number; resolving a name to a node handle is a concern of the
/// [`crate::lookup::lookup`] entry point alone.
pub struct LookupToken {
    pub window: MappedWindow,
    pub kind: TokenKind,
    pub dir_inum: u32,
}

impl LookupToken {
    pub fn new(window: MappedWindow, kind: TokenKind, dir_inum: u32) -> Self {
        Self { window, kind, dir_inum }
    }

    /// The resolved inode number, if this token represents a Found result.
    pub fn found_ino(&self) -> Option<u32> {
        match &self.kind {
            TokenKind::Found { ino, .. } => Some(*ino),
            TokenKind::Create { .. } => None,
        }
    }
}
