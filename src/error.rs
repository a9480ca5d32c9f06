//! Error kinds produced by the directory engine.

use core::fmt;

/// Failure modes surfaced by lookup, the mutators, and readdir.
///
/// This mirrors the hand-written filesystem error enums elsewhere in this
/// codebase rather than pulling in an error-derive crate: there are few
/// variants, each with a fixed one-line message, and no variant carries
/// data that needs formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirError {
    /// `name` exceeds `NAME_MAX`.
    NameTooLong,
    /// `name` is empty, which is never a valid entry name.
    InvalidName,
    /// No entry with the given name exists in this directory.
    NotFound,
    /// A ".." lookup on the filesystem root would escape the mount.
    WouldEscape,
    /// Allocation failed while building a scan or readdir buffer.
    NoMemory,
    /// The underlying file-data or inode-cache collaborator reported an I/O failure.
    IoError,
    /// `grow` could not allocate another block for the directory.
    NoSpace,
    /// The directory (or filesystem) is mounted read-only.
    ReadOnly,
    /// A directory block failed the on-disk record invariants in §3.
    Corrupt,
}

impl fmt::Display for DirError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DirError::NameTooLong => "name too long",
            DirError::InvalidName => "invalid name",
            DirError::NotFound => "no such entry",
            DirError::WouldEscape => "lookup would escape mount root",
            DirError::NoMemory => "out of memory",
            DirError::IoError => "I/O error",
            DirError::NoSpace => "no space to grow directory",
            DirError::ReadOnly => "filesystem is read-only",
            DirError::Corrupt => "corrupt directory block",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for DirError {}
