//! The block scanner: a single pass over one directory block that serves
//! both lookup (find a name) and the mutating operations (also track where
//! a new entry could go), grounded in `dirscanblock` from the original ext2
//! directory code — this is the one routine the original's lookup, enter,
//! and rename paths all funnel through.

use crate::directory::LiveCountCache;
use crate::entry::decode;
use crate::error::DirError;
use crate::geometry::DirGeometry;
use crate::token::Strategy;

/// Whether a scan only needs to find a name, or also needs to track a slot
/// a new entry of a given name could occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    LookupOnly,
    Mutating { insert_name_len: usize },
}

/// Slot-tracking state threaded across the blocks of a single scan.
///
/// Starts at `Looking` and ends either `Found` (an in-block slot exists
/// somewhere among the blocks scanned so far) or, failing that, `Compress`
/// (no in-block slot anywhere, but some block's cumulative dead-space is
/// enough to hold the entry once repacked). `Ignored` is used for
/// `LookupOnly` scans, which never track slots at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Ignored,
    Looking,
    /// Best Compress candidate seen so far: repacking `block_idx` would
    /// free at least enough space, at a cost of copying `copy_bytes` of
    /// live entries to do it. Lower `copy_bytes` wins; ties favor the
    /// earlier (lower-indexed) block, so this is only replaced on a strict
    /// improvement.
    Compress { block_idx: usize, copy_bytes: usize },
    Found { strategy: Strategy, block_idx: usize, anchor_off: usize },
}

/// Result of scanning one block.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    NotHere,
    Found {
        entry_off: usize,
        prev_entry_off: Option<usize>,
        ino: u32,
        file_type: u8,
    },
}

/// Scan one block for `target_name`, updating `slot_state` in place when
/// `mode` is `Mutating` and updating `live_counts[block_idx]` as a side
/// effect of the full pass.
///
/// A block that fails the record invariants partway through is abandoned:
/// logged and reported as `NotHere` for this block, on the theory (carried
/// over unchanged from the original) that a corrupt block should not hide
/// entries in the blocks that follow it, but also should not be treated as
/// fatal to the whole directory.
pub fn scan(
    block: &[u8],
    block_idx: usize,
    target_name: &[u8],
    mode: ScanMode,
    slot_state: &mut SlotState,
    live_counts: &mut LiveCountCache,
    geom: &DirGeometry,
) -> ScanOutcome {
    let tracking = match mode {
        ScanMode::LookupOnly => false,
        ScanMode::Mutating { .. } => matches!(slot_state, SlotState::Looking | SlotState::Compress { .. }),
    };
    let needed = match mode {
        ScanMode::Mutating { insert_name_len } => geom.min_rec(insert_name_len),
        ScanMode::LookupOnly => 0,
    };

    let mut off = 0usize;
    let mut prev_off: Option<usize> = None;
    let mut nentries: u32 = 0;
    let mut cumulative_free = 0usize;
    let mut copy_bytes = 0usize;
    let mut consider_compress = false;
    let mut found_in_block = false;

    while off < block.len() {
        let entry = match decode(block, off, geom) {
            Ok(e) => e,
            Err(_) => {
                log::warn!("directory block {block_idx} corrupt at offset {off}, abandoning block");
                return ScanOutcome::NotHere;
            }
        };

        if tracking && !found_in_block {
            if off != 0 {
                copy_bytes += geom.min_rec(entry.name_len as usize);
            }
            let this_free = entry.free_space(geom);
            if this_free >= needed {
                let strategy = if entry.is_free() { Strategy::Take } else { Strategy::Shrink };
                *slot_state = SlotState::Found { strategy, block_idx, anchor_off: off };
                found_in_block = true;
            } else {
                cumulative_free += this_free;
                if cumulative_free >= needed {
                    consider_compress = true;
                }
            }
        }

        if entry.ino != 0 {
            nentries += 1;
        }

        if entry.ino != 0 && entry.name_len as usize == target_name.len() && entry.name == target_name {
            return ScanOutcome::Found {
                entry_off: entry.offset,
                prev_entry_off: prev_off,
                ino: entry.ino,
                file_type: entry.file_type,
            };
        }

        prev_off = Some(off);
        off += entry.rec_len as usize;
    }

    if tracking && !found_in_block && consider_compress {
        let improves = match *slot_state {
            SlotState::Compress { copy_bytes: prev, .. } => copy_bytes < prev,
            SlotState::Looking => true,
            _ => false,
        };
        if improves {
            *slot_state = SlotState::Compress { block_idx, copy_bytes };
        }
    }

    live_counts.record(block_idx, nentries);
    ScanOutcome::NotHere
}
