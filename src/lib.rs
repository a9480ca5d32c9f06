//! An ext2-style directory engine: the on-disk entry format, the
//! single-pass block scanner, and the lookup/enter/remove/rewrite/readdir
//! operations built on top of it.
//!
//! This crate owns the directory block format and the algorithms over it.
//! It does not own storage (reading/writing/growing a node's bytes) or
//! inode resolution (turning an inode number into a live node handle) —
//! those are named as traits in [`contracts`] and supplied by the caller.

pub mod block;
pub mod contracts;
pub mod directory;
pub mod empty;
pub mod entry;
pub mod error;
pub mod geometry;
pub mod lookup;
pub mod mutate;
pub mod readdir;
pub mod token;

pub use contracts::{FileData, InodeCache, MapProt, MappedWindow, NodeHandle};
pub use directory::{Directory, LiveCountCache};
pub use empty::is_empty;
pub use error::DirError;
pub use geometry::DirGeometry;
pub use lookup::{find_entry, lookup};
pub use mutate::{drop_token, enter, remove, rewrite};
pub use readdir::{get_entries, DirEntryView, ReaddirBatch};
pub use token::{LookupToken, Strategy, TokenKind};
