//! The lookup driver: rotates across a directory's blocks looking for a
//! name, optionally tracking where that name could be inserted if it isn't
//! found, and resolves ".." through a caller-supplied protocol that avoids
//! taking the parent's lock while this directory's is held.
//!
//! Grounded in `diskfs_lookup_hard`: one scanning loop shared by plain
//! lookups and the pre-scan that `diskfs_direnter_hard` runs before
//! inserting a new entry, plus the root/".." special case at its head.

use crate::block::{scan, ScanMode, ScanOutcome, SlotState};
use crate::contracts::{FileData, InodeCache, MapProt, NodeHandle};
use crate::directory::Directory;
use crate::error::DirError;
use crate::geometry::{DirGeometry, NAME_MAX};
use crate::token::{LookupToken, Strategy, TokenKind};

const DOT: &[u8] = b".";
const DOTDOT: &[u8] = b"..";

fn validate_name(name: &[u8]) -> Result<(), DirError> {
    if name.is_empty() {
        return Err(DirError::InvalidName);
    }
    if name.len() > NAME_MAX as usize {
        return Err(DirError::NameTooLong);
    }
    Ok(())
}

/// Scan every block of `dir`, starting from its rotation hint and wrapping
/// around, looking for `name`. When `mode` is `Mutating`, also tracks the
/// best insertion slot seen so far; if the name isn't found, the returned
/// token's `Create` strategy and position reflect that tracking (falling
/// back to `Extend` if no block offered a slot at all).
///
/// `prot` is independent of `mode`: `mode` only controls whether slot
/// tracking runs, while `prot` reflects what the caller actually intends to
/// do with the token afterward. A plain name lookup maps `ReadOnly`; insert
/// always maps `ReadWrite` (it needs `Mutating` anyway); remove and rewrite
/// scan with `LookupOnly` (no slot tracking needed) but still mutate the
/// window afterward, so they must map `ReadWrite` too.
///
/// This is the position-only core shared by [`lookup`] and the mutators in
/// [`crate::mutate`]; it never resolves an inode number to a node handle.
pub fn find_entry<N: NodeHandle>(
    dir: &mut Directory<N>,
    file_data: &dyn FileData<N>,
    name: &[u8],
    mode: ScanMode,
    prot: MapProt,
) -> Result<LookupToken, DirError> {
    validate_name(name)?;

    let num_blocks = dir.num_blocks();
    if num_blocks == 0 {
        return Err(DirError::Corrupt);
    }

    let mut window = file_data.map(dir.node(), dir.size(), prot)?;

    let blksz = dir.geom().blksz() as usize;
    let hint = dir.hint_block_idx();
    let mut slot_state = match mode {
        ScanMode::LookupOnly => SlotState::Ignored,
        ScanMode::Mutating { .. } => SlotState::Looking,
    };

    for step in 0..num_blocks {
        let block_idx = (hint + step) % num_blocks;
        let start = block_idx * blksz;
        let end = start + blksz;
        let outcome = scan(
            &window.data[start..end],
            block_idx,
            name,
            mode,
            &mut slot_state,
            dir.live_counts_mut(),
            dir.geom(),
        );
        if let ScanOutcome::Found { entry_off, prev_entry_off, ino, file_type } = outcome {
            dir.set_hint_block_idx(block_idx);
            let kind = TokenKind::Found {
                block_idx,
                entry_off,
                prev_entry_off,
                ino,
                file_type,
            };
            return Ok(LookupToken::new(window, kind, dir.inum()));
        }
    }

    dir.set_hint_block_idx(hint);

    match mode {
        ScanMode::LookupOnly => {
            file_data.unmap(dir.node(), window).ok();
            Err(DirError::NotFound)
        }
        ScanMode::Mutating { .. } => {
            let kind = match slot_state {
                SlotState::Found { strategy, block_idx, anchor_off } => {
                    TokenKind::Create { strategy, block_idx, anchor_off }
                }
                SlotState::Compress { block_idx, .. } => {
                    TokenKind::Create { strategy: Strategy::Compress, block_idx, anchor_off: 0 }
                }
                SlotState::Looking | SlotState::Ignored => {
                    TokenKind::Create { strategy: Strategy::Extend, block_idx: num_blocks, anchor_off: 0 }
                }
            };
            Ok(LookupToken::new(window, kind, dir.inum()))
        }
    }
}

/// Resolve `name` within `dir` to a node handle.
///
/// ".." is special: resolving it means asking the inode cache for this
/// directory's *parent*, which is only safe to do while this directory's
/// own lock is held if the cache lookup itself never needs to wait on that
/// same lock. Hurd's original handles this by dropping the directory lock,
/// resolving the parent, then reacquiring the lock and re-validating that
/// ".." still names the same parent before trusting the result, retrying
/// from the top if it changed (`diskfs_lookup_hard`'s `retry_dotdot` loop).
/// This crate has no lock of its own to drop — `resolve_dotdot` is the one
/// hook allowed to drop and retake whatever external lock the caller holds
/// on `dir` — but the same race it protects against is still live here: the
/// directory's mapped window is unmapped before `resolve_dotdot` runs, so a
/// concurrent rename of ".." while the external lock is released inside the
/// closure would otherwise go undetected. [`lookup_dotdot`] reproduces the
/// retry loop to catch it.
pub fn lookup<N, C, F>(
    dir: &mut Directory<N>,
    file_data: &dyn FileData<N>,
    inode_cache: &C,
    name: &[u8],
    mut resolve_dotdot: F,
) -> Result<N, DirError>
where
    N: NodeHandle,
    C: InodeCache<N>,
    F: FnMut(u32) -> Result<N, DirError>,
{
    if name == DOTDOT && dir.is_root() {
        return Err(DirError::WouldEscape);
    }

    if name == DOTDOT {
        return lookup_dotdot(dir, file_data, &mut resolve_dotdot);
    }

    let token = find_entry(dir, file_data, name, ScanMode::LookupOnly, MapProt::ReadOnly)?;
    let ino = token.found_ino().expect("find_entry succeeded only on Found");
    file_data.unmap(dir.node(), token.window)?;

    if name == DOT {
        inode_cache.cached_lookup(dir.inum())
    } else {
        inode_cache.cached_lookup(ino)
    }
}

/// Resolve ".." out of `dir`, rescanning to verify the result is still
/// correct after the hand-off closure runs, retrying if ".." changed out
/// from under us while the external lock was briefly released.
fn lookup_dotdot<N, F>(dir: &mut Directory<N>, file_data: &dyn FileData<N>, resolve_dotdot: &mut F) -> Result<N, DirError>
where
    N: NodeHandle,
    F: FnMut(u32) -> Result<N, DirError>,
{
    loop {
        let token = find_entry(dir, file_data, DOTDOT, ScanMode::LookupOnly, MapProt::ReadOnly)?;
        let ino = token.found_ino().expect("find_entry succeeded only on Found");
        file_data.unmap(dir.node(), token.window)?;

        log::warn!("resolving .. out of inode {} via external lock hand-off", dir.inum());
        let parent = resolve_dotdot(ino)?;

        let recheck = find_entry(dir, file_data, DOTDOT, ScanMode::LookupOnly, MapProt::ReadOnly)?;
        let recheck_ino = recheck.found_ino().expect("find_entry succeeded only on Found");
        file_data.unmap(dir.node(), recheck.window)?;

        if recheck_ino == ino {
            return Ok(parent);
        }

        log::warn!(
            "directory {}'s .. changed from {ino} to {recheck_ino} while its lock was released, retrying",
            dir.inum()
        );
        drop(parent);
    }
}

/// Resolve `name` within `dir` for a remove or rename, without blocking.
///
/// Remove and rename already hold whatever lock ordering the caller
/// arranged before calling in, so there is no need for the drop/retake
/// dance `lookup` uses for "..": both the looked-up name and a literal ".."
/// are resolved the same way, through whatever is already resident.
pub fn find_if_cached<N, C>(dir: &Directory<N>, inode_cache: &C, ino: u32) -> Option<N>
where
    N: NodeHandle,
    C: InodeCache<N>,
{
    let _ = dir;
    inode_cache.find_if_cached(ino)
}
