//! The readdir streamer: enumerates live entries in ordinal order, resuming
//! from an arbitrary live-entry ordinal and bounded by both an entry count
//! and a byte budget, using the per-block live-count cache to skip whole
//! blocks of already-tallied entries without decoding them.
//!
//! Grounded in the original's `diskfs_get_directs`/`count_dirents`: an
//! `entry`-ordinal cursor, not a byte offset, and `curentry += dirents[blkno]`
//! to jump past blocks the cache already accounts for.

use crate::contracts::{FileData, MapProt, NodeHandle};
use crate::directory::Directory;
use crate::entry::decode;
use crate::error::DirError;

/// One entry surfaced by [`get_entries`]. `ordinal` is this entry's 0-based
/// position among the directory's live entries — the cookie to pass as
/// `start_ordinal` to resume immediately after it.
#[derive(Debug, Clone)]
pub struct DirEntryView {
    pub name: Vec<u8>,
    pub ino: u32,
    pub file_type: u8,
    pub ordinal: u64,
}

/// A batch of entries read starting at some ordinal.
#[derive(Debug, Clone)]
pub struct ReaddirBatch {
    pub entries: Vec<DirEntryView>,
    /// Ordinal to pass as `start_ordinal` on the next call.
    pub next_ordinal: u64,
    /// Whether this batch reached the end of the directory.
    pub end_of_directory: bool,
}

/// Read live entries from `dir`, starting at the `start_ordinal`-th live
/// entry (a cookie previously returned as `next_ordinal`, or 0 to start from
/// the beginning), stopping once either `max_entries` or `max_bytes` is
/// reached — whichever comes first, except that a batch is never empty
/// unless no more entries exist, so the caller always makes progress even
/// if a single entry's encoded size exceeds `max_bytes`.
///
/// Blocks entirely before `start_ordinal` whose live count is already
/// cached are skipped without decoding, by accumulating their counts; a
/// block straddling `start_ordinal`, or one with no cached count yet, is
/// decoded from its first entry so the exact ordinal boundary can be found.
///
/// A corrupt entry abandons the rest of its block (same policy as the
/// scanner): readdir has no fallback position within a bad block, so unlike
/// lookup, which can simply treat a name as not found, it skips straight to
/// the next block boundary and keeps going.
pub fn get_entries<N: NodeHandle>(
    dir: &mut Directory<N>,
    file_data: &dyn FileData<N>,
    start_ordinal: u64,
    max_entries: usize,
    max_bytes: usize,
) -> Result<ReaddirBatch, DirError> {
    let geom = *dir.geom();
    let blksz = geom.blksz() as usize;
    let num_blocks = dir.num_blocks();
    if num_blocks == 0 {
        return Ok(ReaddirBatch { entries: Vec::new(), next_ordinal: start_ordinal, end_of_directory: true });
    }

    let window = file_data.map(dir.node(), dir.size(), MapProt::ReadOnly)?;

    // Skip whole blocks whose live count is already cached and falls
    // entirely before `start_ordinal`, without decoding them.
    let mut ordinal = 0u64;
    let mut block_idx = 0usize;
    while block_idx < num_blocks {
        match dir.live_counts().get(block_idx) {
            Some(count) if ordinal + count as u64 <= start_ordinal => {
                ordinal += count as u64;
                block_idx += 1;
            }
            _ => break,
        }
    }

    let mut entries: Vec<DirEntryView> = Vec::new();
    let mut bytes_used = 0usize;

    while block_idx < num_blocks {
        let start = block_idx * blksz;
        let block = &window.data[start..start + blksz];
        let mut off = 0usize;
        let mut nentries_this_block: u32 = 0;
        let mut entry_ordinal = ordinal;
        let mut corrupted = false;
        let mut cap_hit = false;

        while off < blksz {
            let entry = match decode(block, off, &geom) {
                Ok(e) => e,
                Err(_) => {
                    log::warn!("directory block {block_idx} corrupt at offset {off} during readdir, skipping rest of block");
                    corrupted = true;
                    break;
                }
            };
            if entry.ino != 0 {
                if entry_ordinal >= start_ordinal {
                    let size = geom.min_rec(entry.name_len as usize);
                    if !entries.is_empty() && (entries.len() >= max_entries || bytes_used + size > max_bytes) {
                        cap_hit = true;
                        break;
                    }
                    entries.push(DirEntryView {
                        name: entry.name.to_vec(),
                        ino: entry.ino,
                        file_type: entry.file_type,
                        ordinal: entry_ordinal,
                    });
                    bytes_used += size;
                }
                nentries_this_block += 1;
                entry_ordinal += 1;
            }
            off += entry.rec_len as usize;

            if entries.len() >= max_entries {
                cap_hit = true;
                break;
            }
        }

        // The live count is only trustworthy once a block has been walked
        // to its end without interruption; a cap-hit or corrupt block may
        // have stopped short of entries this pass never saw.
        ordinal += nentries_this_block as u64;
        if !corrupted && !cap_hit {
            dir.live_counts_mut().record(block_idx, nentries_this_block);
        }
        if cap_hit {
            break;
        }
        block_idx += 1;
    }

    let end_of_directory = block_idx >= num_blocks;
    let next_ordinal = entries.last().map(|e| e.ordinal + 1).unwrap_or(start_ordinal.max(ordinal));

    file_data.unmap(dir.node(), window)?;
    Ok(ReaddirBatch { entries, next_ordinal, end_of_directory })
}
