//! The three mutators: enter (insert), remove, and rewrite (change the
//! target of an existing entry in place). Each consumes a [`LookupToken`]
//! produced by [`crate::lookup::find_entry`] and commits its change by
//! unmapping the token's window.
//!
//! Grounded in `diskfs_direnter_hard`, `diskfs_dirremove_hard`, and
//! `diskfs_dirrewrite_hard`.

use crate::contracts::{FileData, MapProt, NodeHandle};
use crate::directory::Directory;
use crate::entry::{decode, set_file_type, set_ino, set_rec_len, write_entry};
use crate::error::DirError;
use crate::token::{LookupToken, Strategy, TokenKind};

/// Insert `name` -> `ino` (with the given `file_type`) into `dir`, using the
/// strategy and position `token` recorded when it failed to find `name`
/// already present.
///
/// `token` must be a `Create` token produced by scanning `dir` for this same
/// `name`; passing one from a different name or a stale scan is a logic
/// error in the caller; the slot it names may no longer be valid in that case.
pub fn enter<N: NodeHandle>(
    dir: &mut Directory<N>,
    file_data: &dyn FileData<N>,
    token: LookupToken,
    name: &[u8],
    ino: u32,
    file_type: u8,
) -> Result<(), DirError> {
    let LookupToken { mut window, kind, .. } = token;
    let (strategy, block_idx, anchor_off) = match kind {
        TokenKind::Create { strategy, block_idx, anchor_off } => (strategy, block_idx, anchor_off),
        TokenKind::Found { .. } => {
            file_data.unmap(dir.node(), window).ok();
            return Err(DirError::Corrupt);
        }
    };

    let geom = *dir.geom();
    let blksz = geom.blksz() as usize;

    match strategy {
        Strategy::Take => {
            let start = block_idx * blksz;
            let slot = decode(&window.data[start..start + blksz], anchor_off, &geom)?;
            let rec_len = slot.rec_len;
            write_entry(&mut window.data[start..start + blksz], anchor_off, ino, rec_len, name, file_type, &geom);
        }
        Strategy::Shrink => {
            let start = block_idx * blksz;
            let block = &mut window.data[start..start + blksz];
            let live = decode(block, anchor_off, &geom)?;
            let live_min = live.min_rec(&geom);
            let total_rec_len = live.rec_len;
            set_rec_len(block, anchor_off, live_min as u16);
            let new_off = anchor_off + live_min;
            let new_rec_len = total_rec_len - live_min as u16;
            write_entry(block, new_off, ino, new_rec_len, name, file_type, &geom);
        }
        Strategy::Compress => {
            let start = block_idx * blksz;
            compress_block(&mut window.data[start..start + blksz], &geom, name, ino, file_type)?;
        }
        Strategy::Extend => {
            let new_size = dir.size() + geom.blksz() as u64;
            let mut grown = dir.size();
            while grown < new_size {
                file_data.grow(dir.node(), new_size)?;
                let reported = file_data.size(dir.node())?;
                if reported <= grown {
                    return Err(DirError::NoSpace);
                }
                grown = reported;
            }
            window.data.resize(new_size as usize, 0);
            let new_block_start = dir.size() as usize;
            write_entry(
                &mut window.data[new_block_start..new_block_start + blksz],
                0,
                ino,
                geom.blksz() as u16,
                name,
                file_type,
                &geom,
            );
            dir.grew_by_one_block();
            dir.live_counts_mut().push(1);
        }
    }

    if !matches!(strategy, Strategy::Extend) {
        dir.live_counts_mut().invalidate(block_idx);
    }
    file_data.unmap(dir.node(), window)?;
    file_data.update_metadata(dir.node(), false)?;
    Ok(())
}

/// Repack every live entry in `block` to the front, back to back with no
/// slack, then write the new entry into whatever space that freed at the
/// end. Grounded in the compaction loop in `diskfs_direnter_hard`: walk
/// once collecting live entries, walk again writing them out tightly.
fn compress_block(
    block: &mut [u8],
    geom: &crate::geometry::DirGeometry,
    name: &[u8],
    ino: u32,
    file_type: u8,
) -> Result<(), DirError> {
    struct Live {
        ino: u32,
        file_type: u8,
        name: Vec<u8>,
    }

    let mut live = Vec::new();
    let mut off = 0usize;
    while off < block.len() {
        let e = decode(block, off, geom)?;
        if e.ino != 0 {
            live.push(Live { ino: e.ino, file_type: e.file_type, name: e.name.to_vec() });
        }
        off += e.rec_len as usize;
    }

    block.fill(0);
    let mut write_off = 0usize;
    for entry in &live {
        let rec_len = geom.min_rec(entry.name.len()) as u16;
        write_entry(block, write_off, entry.ino, rec_len, &entry.name, entry.file_type, geom);
        write_off += rec_len as usize;
    }

    let remaining = block.len() - write_off;
    write_entry(block, write_off, ino, remaining as u16, name, file_type, geom);
    Ok(())
}

/// Remove the entry named by `token` (a `Found` token) from `dir`.
///
/// When the removed entry has a predecessor in the same block, its
/// `rec_len` is merged into the predecessor's — the removed slot becomes
/// silently reachable only as the predecessor's trailing slack, exactly as
/// the original leaves it. Otherwise the entry is tombstoned in place
/// (`ino` zeroed, `rec_len` untouched) so it remains a valid free slot.
pub fn remove<N: NodeHandle>(
    dir: &mut Directory<N>,
    file_data: &dyn FileData<N>,
    token: LookupToken,
) -> Result<u32, DirError> {
    let LookupToken { mut window, kind, .. } = token;
    let (block_idx, entry_off, prev_off, ino) = match kind {
        TokenKind::Found { block_idx, entry_off, prev_entry_off, ino, .. } => {
            (block_idx, entry_off, prev_entry_off, ino)
        }
        TokenKind::Create { .. } => {
            file_data.unmap(dir.node(), window).ok();
            return Err(DirError::NotFound);
        }
    };

    let geom = *dir.geom();
    let blksz = geom.blksz() as usize;
    let start = block_idx * blksz;
    let block = &mut window.data[start..start + blksz];

    let removed = decode(block, entry_off, &geom)?;
    let removed_rec_len = removed.rec_len;
    set_ino(block, entry_off, 0);

    if let Some(prev_off) = prev_off {
        let prev = decode(block, prev_off, &geom)?;
        let merged = prev.rec_len + removed_rec_len;
        set_rec_len(block, prev_off, merged);
    }

    dir.live_counts_mut().invalidate(block_idx);
    file_data.unmap(dir.node(), window)?;
    file_data.update_metadata(dir.node(), false)?;
    Ok(ino)
}

/// Change the target of the entry named by `token` (a `Found` token) to
/// `new_ino`/`new_file_type`, in place. Used by rename-onto-an-existing-name.
pub fn rewrite<N: NodeHandle>(
    dir: &mut Directory<N>,
    file_data: &dyn FileData<N>,
    token: LookupToken,
    new_ino: u32,
    new_file_type: u8,
) -> Result<(), DirError> {
    let LookupToken { mut window, kind, .. } = token;
    let (block_idx, entry_off) = match kind {
        TokenKind::Found { block_idx, entry_off, .. } => (block_idx, entry_off),
        TokenKind::Create { .. } => {
            file_data.unmap(dir.node(), window).ok();
            return Err(DirError::NotFound);
        }
    };

    let geom = *dir.geom();
    let blksz = geom.blksz() as usize;
    let start = block_idx * blksz;
    let block = &mut window.data[start..start + blksz];
    set_ino(block, entry_off, new_ino);
    set_file_type(block, entry_off, new_file_type);

    file_data.unmap(dir.node(), window)?;
    file_data.update_metadata(dir.node(), false)?;
    Ok(())
}

/// Abandon `token` without committing any change to `dir`: unmaps its
/// window exactly as a mutator would, but never writes to it first. Used to
/// release a scan result an upper layer decided not to act on (e.g. after a
/// permission check fails between lookup and the mutation it was for).
pub fn drop_token<N: NodeHandle>(dir: &Directory<N>, file_data: &dyn FileData<N>, token: LookupToken) -> Result<(), DirError> {
    file_data.unmap(dir.node(), token.window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ScanMode;
    use crate::contracts::{InodeCache, MappedWindow};
    use crate::entry::decode;
    use crate::geometry::DirGeometry;
    use crate::lookup::find_entry;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Clone)]
    struct TestNode(u32);
    impl NodeHandle for TestNode {
        fn inum(&self) -> u32 {
            self.0
        }
    }

    struct TestFileData {
        blocks: RefCell<Vec<u8>>,
        grown_to: RefCell<Option<u64>>,
        /// Caps how many bytes a single `grow` call actually allocates,
        /// simulating a backing store that satisfies growth in increments
        /// smaller than what was requested. `None` means a call always
        /// reaches the requested size in one shot.
        grow_step: Option<u64>,
        grow_calls: RefCell<u32>,
    }
    impl FileData<TestNode> for TestFileData {
        fn map(&self, _node: &TestNode, _len: u64, _prot: MapProt) -> Result<MappedWindow, DirError> {
            Ok(MappedWindow::new(self.blocks.borrow().clone()))
        }
        fn unmap(&self, _node: &TestNode, window: MappedWindow) -> Result<(), DirError> {
            *self.blocks.borrow_mut() = window.data;
            Ok(())
        }
        fn read(&self, _node: &TestNode, _buf: &mut [u8], _offset: u64) -> Result<usize, DirError> {
            unimplemented!()
        }
        fn grow(&self, _node: &TestNode, new_size: u64) -> Result<(), DirError> {
            *self.grow_calls.borrow_mut() += 1;
            let mut blocks = self.blocks.borrow_mut();
            let current = blocks.len() as u64;
            if current >= new_size {
                return Ok(());
            }
            let target = match self.grow_step {
                Some(step) => (current + step).min(new_size),
                None => new_size,
            };
            blocks.resize(target as usize, 0);
            *self.grown_to.borrow_mut() = Some(target);
            Ok(())
        }
        fn size(&self, _node: &TestNode) -> Result<u64, DirError> {
            Ok(self.blocks.borrow().len() as u64)
        }
        fn update_metadata(&self, _node: &TestNode, _wait: bool) -> Result<(), DirError> {
            Ok(())
        }
    }

    #[allow(dead_code)]
    struct TestCache;
    impl InodeCache<TestNode> for TestCache {
        fn cached_lookup(&self, inum: u32) -> Result<TestNode, DirError> {
            Ok(TestNode(inum))
        }
        fn find_if_cached(&self, inum: u32) -> Option<TestNode> {
            Some(TestNode(inum))
        }
    }

    fn one_block_dir(entries: &[(u32, u16, &[u8])], blksz: u32) -> (Directory<TestNode>, TestFileData) {
        let geom = DirGeometry::new(blksz).unwrap();
        let mut block = vec![0u8; blksz as usize];
        let mut off = 0usize;
        for (ino, rec_len, name) in entries {
            write_entry(&mut block, off, *ino, *rec_len, name, 1, &geom);
            off += *rec_len as usize;
        }
        let dir = Directory::new(TestNode(2), true, blksz as u64, geom);
        (
            dir,
            TestFileData {
                blocks: RefCell::new(block),
                grown_to: RefCell::new(None),
                grow_step: None,
                grow_calls: RefCell::new(0),
            },
        )
    }

    #[test]
    fn take_writes_into_an_existing_free_slot() {
        let (mut dir, fd) = one_block_dir(&[(5, 16, b"alpha")], 64);
        {
            let geom = *dir.geom();
            let mut block = fd.blocks.borrow_mut();
            write_entry(&mut block, 16, 0, 48, b"", 0, &geom);
        }
        let token = find_entry(&mut dir, &fd, b"beta", ScanMode::Mutating { insert_name_len: 4 }, MapProt::ReadWrite).unwrap();
        enter(&mut dir, &fd, token, b"beta", 9, 1).unwrap();

        let block = fd.blocks.borrow();
        let e = decode(&block, 16, dir.geom()).unwrap();
        assert_eq!(e.ino, 9);
        assert_eq!(e.name, b"beta");
    }

    #[test]
    fn shrink_splits_a_live_entrys_slack_into_a_new_slot() {
        let (mut dir, fd) = one_block_dir(&[(5, 64, b"alpha")], 64);
        let token = find_entry(&mut dir, &fd, b"b", ScanMode::Mutating { insert_name_len: 1 }, MapProt::ReadWrite).unwrap();
        enter(&mut dir, &fd, token, b"b", 9, 1).unwrap();

        let block = fd.blocks.borrow();
        let first = decode(&block, 0, dir.geom()).unwrap();
        assert_eq!(first.ino, 5);
        assert_eq!(first.rec_len as usize, dir.geom().min_rec(5));
        let second = decode(&block, first.rec_len as usize, dir.geom()).unwrap();
        assert_eq!(second.ino, 9);
        assert_eq!(second.name, b"b");
    }

    #[test]
    fn compress_repacks_and_frees_space_for_the_new_entry() {
        // Each entry's own slack (24 bytes) falls short of what the new,
        // longer name needs (40), but their combined slack (48) covers it —
        // exactly the case only Compress, not Take or Shrink, can serve.
        let (mut dir, fd) = one_block_dir(&[(5, 40, b"alpha"), (6, 40, b"beta")], 80);
        let long_name = b"a-rather-long-requested-name".as_slice();
        assert_eq!(long_name.len(), 29);
        let token = find_entry(&mut dir, &fd, long_name, ScanMode::Mutating { insert_name_len: long_name.len() }, MapProt::ReadWrite).unwrap();
        assert!(matches!(token.kind, TokenKind::Create { strategy: Strategy::Compress, .. }));
        enter(&mut dir, &fd, token, long_name, 42, 1).unwrap();

        let block = fd.blocks.borrow();
        let e0 = decode(&block, 0, dir.geom()).unwrap();
        assert_eq!(e0.ino, 5);
        let e1 = decode(&block, e0.rec_len as usize, dir.geom()).unwrap();
        assert_eq!(e1.ino, 6);
        let e2_off = e0.rec_len as usize + e1.rec_len as usize;
        let e2 = decode(&block, e2_off, dir.geom()).unwrap();
        assert_eq!(e2.ino, 42);
        assert_eq!(e2.name, long_name);
    }

    #[test]
    fn extend_grows_the_directory_by_one_block_when_no_slack_exists() {
        // A 24-byte name makes this single entry's min_rec exactly 32,
        // filling a 32-byte block with zero trailing slack anywhere.
        let full_name = b"012345678901234567890123".as_slice();
        assert_eq!(full_name.len(), 24);
        let (mut dir, fd) = one_block_dir(&[(5, 32, full_name)], 32);

        let token = find_entry(&mut dir, &fd, b"new", ScanMode::Mutating { insert_name_len: 3 }, MapProt::ReadWrite).unwrap();
        assert!(matches!(token.kind, TokenKind::Create { strategy: Strategy::Extend, .. }));
        enter(&mut dir, &fd, token, b"new", 9, 1).unwrap();

        assert_eq!(dir.size(), 64);
        assert_eq!(*fd.grown_to.borrow(), Some(64));

        let block = fd.blocks.borrow();
        let e = decode(&block, 32, dir.geom()).unwrap();
        assert_eq!(e.ino, 9);
        assert_eq!(e.rec_len, 32);
        assert_eq!(e.name, b"new");
    }

    #[test]
    fn extend_loops_until_a_partial_grow_reaches_the_target_size() {
        let full_name = b"012345678901234567890123".as_slice();
        let (mut dir, mut fd) = one_block_dir(&[(5, 32, full_name)], 32);
        // Each `grow` call only satisfies 8 of the 32 bytes asked for, so
        // reaching the new block takes four calls.
        fd.grow_step = Some(8);

        let token = find_entry(&mut dir, &fd, b"new", ScanMode::Mutating { insert_name_len: 3 }, MapProt::ReadWrite).unwrap();
        enter(&mut dir, &fd, token, b"new", 9, 1).unwrap();

        assert_eq!(dir.size(), 64);
        assert_eq!(*fd.grow_calls.borrow(), 4);
        let block = fd.blocks.borrow();
        let e = decode(&block, 32, dir.geom()).unwrap();
        assert_eq!(e.ino, 9);
        assert_eq!(e.name, b"new");
    }

    #[test]
    fn remove_tombstones_a_first_entry_in_block() {
        let (mut dir, fd) = one_block_dir(&[(5, 16, b"alpha"), (6, 48, b"beta")], 64);
        let token = find_entry(&mut dir, &fd, b"alpha", ScanMode::LookupOnly, MapProt::ReadWrite).unwrap();
        let removed = remove(&mut dir, &fd, token).unwrap();
        assert_eq!(removed, 5);

        let block = fd.blocks.borrow();
        let e = decode(&block, 0, dir.geom()).unwrap();
        assert_eq!(e.ino, 0);
        assert_eq!(e.rec_len, 16);
    }

    #[test]
    fn remove_merges_into_predecessor_when_one_exists() {
        let (mut dir, fd) = one_block_dir(&[(5, 16, b"alpha"), (6, 48, b"beta")], 64);
        let token = find_entry(&mut dir, &fd, b"beta", ScanMode::LookupOnly, MapProt::ReadWrite).unwrap();
        remove(&mut dir, &fd, token).unwrap();

        let block = fd.blocks.borrow();
        let first = decode(&block, 0, dir.geom()).unwrap();
        assert_eq!(first.ino, 5);
        assert_eq!(first.rec_len, 64);
    }

    #[test]
    fn rewrite_changes_the_target_inode_in_place() {
        let (mut dir, fd) = one_block_dir(&[(5, 64, b"alpha")], 64);
        let token = find_entry(&mut dir, &fd, b"alpha", ScanMode::LookupOnly, MapProt::ReadWrite).unwrap();
        rewrite(&mut dir, &fd, token, 77, 2).unwrap();

        let block = fd.blocks.borrow();
        let e = decode(&block, 0, dir.geom()).unwrap();
        assert_eq!(e.ino, 77);
        assert_eq!(e.file_type, 2);
        assert_eq!(e.name, b"alpha");
    }

    #[test]
    fn drop_token_releases_a_scan_without_mutating_anything() {
        let (mut dir, fd) = one_block_dir(&[(5, 64, b"alpha")], 64);
        let before = fd.blocks.borrow().clone();
        let token = find_entry(&mut dir, &fd, b"alpha", ScanMode::LookupOnly, MapProt::ReadOnly).unwrap();
        drop_token(&dir, &fd, token).unwrap();
        assert_eq!(*fd.blocks.borrow(), before);
    }
}
