//! Tree walking: descend a B-tree from its root to the leaf that would
//! hold a given key, then iterate that leaf's items forward.
//!
//! This crate only ever needs point lookups (does some leaf hold a
//! `CHUNK_ITEM` covering a given logical offset?), never range scans or
//! ordered traversal of a whole tree, so `NodeSearchOption` names a
//! single target key rather than a `[min, max]` range. Keys in a btrfs
//! tree are range starts, so the descent at every level picks the
//! rightmost key (internal key-pointer, or leaf item) that is `<=` the
//! target — the standard B-tree point-lookup convention — and the
//! returned iterator then walks forward through the rest of that leaf.

use crate::btrfs::FsInfo;
use crate::btrfs_node::{block_as_internal_node, block_as_leaf_node, BtrfsLeafNodeIter};
use crate::error::ScanError;
use crate::mapper::load_virt_block;
use crate::structures::*;
use std::cmp::Ordering;

#[derive(Clone, Copy)]
pub struct NodeSearchOption {
    pub min_key: btrfs_disk_key,
    pub max_key: btrfs_disk_key,
}

fn cmp_key(a: &btrfs_disk_key, b: &btrfs_disk_key) -> Ordering {
    let (ao, at, aoff) = (a.objectid, a.item_type as u8, a.offset);
    let (bo, bt, boff) = (b.objectid, b.item_type as u8, b.offset);
    (ao, at, aoff).cmp(&(bo, bt, boff))
}

/// Binary search for the rightmost index `i` in `0..n` with
/// `key_at(i) <= target`, or `0` if no such index exists (the tree is
/// empty, or every key in this node sorts after the target — descending
/// into the first child is still the correct thing to do).
fn rightmost_le<F: Fn(u32) -> btrfs_disk_key>(n: u32, target: &btrfs_disk_key, key_at: F) -> u32 {
    if n == 0 {
        return 0;
    }
    let mut lo = 0i64;
    let mut hi = n as i64 - 1;
    let mut found = -1i64;
    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let key = key_at(mid as u32);
        if cmp_key(&key, target) != Ordering::Greater {
            found = mid;
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }
    if found < 0 {
        0
    } else {
        found as u32
    }
}

fn descend_to_leaf<'a>(
    fs: &'a FsInfo,
    root: LE64,
    target: &btrfs_disk_key,
) -> Result<BtrfsLeafNodeIter<'a>, ScanError> {
    let mut block_offset = root;
    loop {
        let block = load_virt_block(fs, block_offset)?;
        let header = unsafe { &*(block.as_ptr() as *const btrfs_header) };
        if header.level == 0 {
            let leaf = block_as_leaf_node(block, block_offset);
            let idx = rightmost_le(leaf.nritems(), target, |i| leaf.item_at(i).unwrap().0.key);
            let mut leaf = leaf;
            leaf.seek(idx);
            return Ok(leaf);
        }

        let internal = block_as_internal_node(block, block_offset);
        let idx = rightmost_le(internal.nritems(), target, |i| internal.item_at(i).unwrap().key);
        let key_ptr = internal
            .item_at(idx)
            .ok_or_else(|| ScanError::Format("internal node has no key pointers".to_string()))?;
        block_offset = key_ptr.blockptr;
    }
}

/// Walks forward through the leaf that a point lookup for
/// `options.min_key` descends to, yielding every remaining item in that
/// leaf in increasing key order. Does not cross into sibling leaves —
/// callers only ever search for a single `CHUNK_ITEM`, which the chunk
/// tree's typically small fan-out puts in reach of one leaf.
pub struct BtrfsTreeIter<'a> {
    leaf: Option<BtrfsLeafNodeIter<'a>>,
}

impl<'a> BtrfsTreeIter<'a> {
    pub fn new(fs: &'a FsInfo, root: LE64, options: NodeSearchOption) -> BtrfsTreeIter<'a> {
        match descend_to_leaf(fs, root, &options.min_key) {
            Ok(leaf) => BtrfsTreeIter { leaf: Some(leaf) },
            Err(_) => BtrfsTreeIter { leaf: None },
        }
    }
}

impl<'a> Iterator for BtrfsTreeIter<'a> {
    type Item = (&'a btrfs_item, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let leaf = self.leaf.as_mut()?;
        let (item, data, _, _) = leaf.next()?;
        Some((item, data))
    }
}
