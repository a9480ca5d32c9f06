//! The emptiness predicate used before unlinking a directory: true only if
//! every live entry is "." or "..".
//!
//! Grounded in `diskfs_dirempty`: a plain scan over every block that bails
//! out the moment it sees anything else, without touching the live-count
//! cache or the rotation hint (this is a read-only, whole-directory check,
//! not a name lookup).

use crate::contracts::{FileData, MapProt, NodeHandle};
use crate::directory::Directory;
use crate::entry::decode;
use crate::error::DirError;

/// Whether `dir` contains no entries besides "." and "..".
///
/// A corrupt block is treated as non-empty: we would rather report a
/// directory as "not empty" and refuse to unlink it than silently approve
/// removing something a corrupt scan couldn't fully vouch for.
pub fn is_empty<N: NodeHandle>(dir: &Directory<N>, file_data: &dyn FileData<N>) -> Result<bool, DirError> {
    let geom = *dir.geom();
    let blksz = geom.blksz() as usize;
    let num_blocks = dir.num_blocks();
    if num_blocks == 0 {
        return Ok(true);
    }

    let window = file_data.map(dir.node(), dir.size(), MapProt::ReadOnly)?;
    for block_idx in 0..num_blocks {
        let start = block_idx * blksz;
        let block = &window.data[start..start + blksz];
        let mut off = 0usize;
        while off < blksz {
            let entry = match decode(block, off, &geom) {
                Ok(e) => e,
                Err(err) => {
                    log::warn!("directory block {block_idx} corrupt at offset {off} during emptiness check");
                    file_data.unmap(dir.node(), window).ok();
                    return Err(err);
                }
            };
            if entry.ino != 0 && entry.name != b"." && entry.name != b".." {
                file_data.unmap(dir.node(), window).ok();
                return Ok(false);
            }
            off += entry.rec_len as usize;
        }
    }

    file_data.unmap(dir.node(), window)?;
    Ok(true)
}
