//! Logical-to-physical mapper.
//!
//! The B-tree lives in a logical address space that the chunk tree maps
//! onto physical `(device, offset)` stripes — necessary because chunks can
//! be striped or mirrored across devices. This module resolves that
//! mapping two ways, tried in order, mirroring `load_virt_block`'s
//! "bootstrap array first, then search the chunk tree" strategy in the
//! teacher:
//!
//! 1. `BootstrapMapper` answers directly from the superblock's
//!    `sys_chunk_array`, without needing the chunk tree to be readable yet
//!    — this is what lets the mapper resolve the chunk tree's own blocks.
//! 2. `ChunkTreeMapper` searches the chunk tree itself for a `CHUNK_ITEM`
//!    whose key matches the requested logical start.
//!
//! `FsMapper` composes both, and is what the scanner is built against.
//!
//! Every mapper here always returns (and the scanner always reads)
//! stripe zero. Reading alternate mirrors on checksum failure would
//! improve recovery odds for replicated filesystems but is not
//! implemented.

use crate::btrfs::{DeviceInfo, FsInfo};
use crate::error::ScanError;
use crate::structures::*;
use crate::tree::NodeSearchOption;
use std::rc::Rc;

/// One physical copy of a logical byte range.
pub struct Stripe {
    pub device: Rc<DeviceInfo>,
    pub physical_offset: u64,
    pub stripe_length: u64,
}

/// `map(logical_offset, len) -> stripes | end-of-data`.
pub trait LogicalMapper {
    fn map(&self, logical_offset: u64, len: u64) -> Result<Vec<Stripe>, ScanError>;
}

/// Resolves an offset against the superblock's bootstrap chunk array only.
pub struct BootstrapMapper<'a> {
    fs: &'a FsInfo,
}

impl<'a> BootstrapMapper<'a> {
    pub fn new(fs: &'a FsInfo) -> BootstrapMapper<'a> {
        BootstrapMapper { fs }
    }
}

impl<'a> LogicalMapper for BootstrapMapper<'a> {
    fn map(&self, logical_offset: u64, len: u64) -> Result<Vec<Stripe>, ScanError> {
        for chunk in &self.fs.bootstrap_chunks {
            let start = chunk.key.offset;
            let length = chunk.chunk.length;
            if logical_offset >= start && logical_offset < start + length {
                return stripes_for_chunk(self.fs, start, length, &chunk.stripes, logical_offset, len);
            }
        }
        Err(ScanError::Mapping(format!(
            "logical offset {logical_offset} not covered by bootstrap chunk array"
        )))
    }
}

/// Resolves an offset by searching the chunk tree for a matching
/// `CHUNK_ITEM`.
pub struct ChunkTreeMapper<'a> {
    fs: &'a FsInfo,
}

impl<'a> ChunkTreeMapper<'a> {
    pub fn new(fs: &'a FsInfo) -> ChunkTreeMapper<'a> {
        ChunkTreeMapper { fs }
    }
}

impl<'a> LogicalMapper for ChunkTreeMapper<'a> {
    fn map(&self, logical_offset: u64, len: u64) -> Result<Vec<Stripe>, ScanError> {
        let search = NodeSearchOption {
            min_key: btrfs_disk_key {
                objectid: BTRFS_FIRST_CHUNK_TREE_OBJECTID,
                item_type: BtrfsItemType::CHUNK_ITEM,
                offset: logical_offset,
            },
            max_key: btrfs_disk_key {
                objectid: BTRFS_FIRST_CHUNK_TREE_OBJECTID,
                item_type: BtrfsItemType::CHUNK_ITEM,
                offset: logical_offset,
            },
        };

        for (item, data) in self.fs.search_node(self.fs.master_sb.chunk_root, &search) {
            if item.key.item_type != BtrfsItemType::CHUNK_ITEM {
                continue;
            }
            let (chunk, stripes) = parse_chunk_item(data);
            let start = item.key.offset;
            if logical_offset >= start && logical_offset < start + chunk.length {
                return stripes_for_chunk(self.fs, start, chunk.length, &stripes, logical_offset, len);
            }
        }

        Err(ScanError::Mapping(format!(
            "logical offset {logical_offset} not found in chunk tree"
        )))
    }
}

/// Tries the bootstrap mapper, then falls back to the chunk tree mapper —
/// the composed mapper the scanner is driven against.
pub struct FsMapper<'a> {
    bootstrap: BootstrapMapper<'a>,
    chunk_tree: ChunkTreeMapper<'a>,
}

impl<'a> FsMapper<'a> {
    pub fn new(fs: &'a FsInfo) -> FsMapper<'a> {
        FsMapper {
            bootstrap: BootstrapMapper::new(fs),
            chunk_tree: ChunkTreeMapper::new(fs),
        }
    }
}

impl<'a> LogicalMapper for FsMapper<'a> {
    fn map(&self, logical_offset: u64, len: u64) -> Result<Vec<Stripe>, ScanError> {
        match self.bootstrap.map(logical_offset, len) {
            Ok(stripes) => Ok(stripes),
            Err(_) => self.chunk_tree.map(logical_offset, len),
        }
    }
}

fn stripes_for_chunk(
    fs: &FsInfo,
    chunk_start: u64,
    chunk_length: u64,
    chunk_stripes: &[btrfs_stripe],
    logical_offset: u64,
    len: u64,
) -> Result<Vec<Stripe>, ScanError> {
    let within_chunk = logical_offset - chunk_start;
    let remaining_in_chunk = chunk_length - within_chunk;
    let stripe_length = len.min(remaining_in_chunk);
    let mut out = Vec::new();
    for stripe in chunk_stripes {
        if let Some(dev) = fs.devid_map.get(&stripe.devid) {
            out.push(Stripe {
                device: Rc::clone(dev),
                physical_offset: stripe.offset + within_chunk,
                stripe_length,
            });
        }
    }
    if out.is_empty() {
        return Err(ScanError::Mapping(
            "no device holding any stripe copy is present".to_string(),
        ));
    }
    Ok(out)
}

/// Parse a `(btrfs_chunk, stripes)` pair out of a chunk tree leaf item's
/// data slice. The on-disk layout is the fixed `btrfs_chunk` fields
/// followed directly by `num_stripes` `btrfs_stripe` entries.
fn parse_chunk_item(data: &[u8]) -> (btrfs_chunk, Vec<btrfs_stripe>) {
    let chunk_size = std::mem::size_of::<btrfs_chunk>();
    let chunk = unsafe { std::ptr::read_unaligned(data.as_ptr() as *const btrfs_chunk) };

    let stripe_size = std::mem::size_of::<btrfs_stripe>();
    let mut stripes = Vec::with_capacity(chunk.num_stripes as usize);
    for i in 0..chunk.num_stripes as usize {
        let offset = chunk_size + i * stripe_size;
        let stripe =
            unsafe { std::ptr::read_unaligned(data[offset..].as_ptr() as *const btrfs_stripe) };
        stripes.push(stripe);
    }
    (chunk, stripes)
}

/// Returns a reference to the structure of a specified type at a
/// particular virtual (logical) address, via the memory-mapped device
/// view. Used by the tree walker, which needs zero-copy random access to
/// many small structures rather than the `Stripe`-list interface the
/// scanner uses.
///
/// Checks bootstrap chunks first, then falls back to a chunk tree search,
/// matching `FsMapper`'s resolution order.
pub fn load_virt_block(fs: &FsInfo, virt_offset: u64) -> Result<&[u8], ScanError> {
    let node_length = fs.master_sb.nodesize as u64;

    for chunk in &fs.bootstrap_chunks {
        let start = chunk.key.offset;
        let length = chunk.chunk.length;
        if virt_offset >= start && virt_offset < start + length {
            for stripe in &chunk.stripes {
                if let Some(dev) = fs.devid_map.get(&stripe.devid) {
                    return Ok(dev
                        .file
                        .slice((virt_offset - start + stripe.offset) as usize, node_length as usize));
                }
            }
            return Err(ScanError::Mapping(
                "no device holding any stripe copy is present".to_string(),
            ));
        }
    }

    let search = NodeSearchOption {
        min_key: btrfs_disk_key {
            objectid: BTRFS_FIRST_CHUNK_TREE_OBJECTID,
            item_type: BtrfsItemType::CHUNK_ITEM,
            offset: virt_offset,
        },
        max_key: btrfs_disk_key {
            objectid: BTRFS_FIRST_CHUNK_TREE_OBJECTID,
            item_type: BtrfsItemType::CHUNK_ITEM,
            offset: virt_offset,
        },
    };

    for (item, data) in fs.search_node(fs.master_sb.chunk_root, &search) {
        if item.key.item_type != BtrfsItemType::CHUNK_ITEM {
            continue;
        }
        let (chunk, stripes) = parse_chunk_item(data);
        let start = item.key.offset;
        if virt_offset >= start && virt_offset < start + chunk.length {
            for stripe in &stripes {
                if let Some(dev) = fs.devid_map.get(&stripe.devid) {
                    return Ok(dev
                        .file
                        .slice((virt_offset - start + stripe.offset) as usize, node_length as usize));
                }
            }
        }
    }

    Err(ScanError::Mapping(format!(
        "virt address {virt_offset} not found among available chunks/devices"
    )))
}
