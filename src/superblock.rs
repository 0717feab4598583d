//! Superblock discovery and parsing.
//!
//! Scope is deliberately narrow: this module reads and validates the
//! *primary* superblock at `BTRFS_SUPER_INFO_OFFSET` only. It does not
//! scan `super_roots[]` backups, does not reconcile multiple devices'
//! superblocks against each other (`btrfs_scan_for_fsid`), and does not
//! repair anything.

use crate::checksum;
use crate::error::ScanError;
use crate::structures::*;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// One entry of the superblock's bootstrap `sys_chunk_array`: the key the
/// chunk item was filed under, the chunk descriptor itself, and its
/// stripes (physical copies).
pub struct ChunkInfo {
    pub key: btrfs_disk_key,
    pub chunk: btrfs_chunk,
    pub stripes: Vec<btrfs_stripe>,
}

/// Read and validate the primary superblock of the device at `path`.
///
/// Checks performed: magic number, checksum (CRC32 only — this crate
/// doesn't implement the newer xxhash/sha256/blake2 checksum algorithms;
/// an unsupported algorithm is a reported `ScanError::Format` rather than
/// a panic).
pub fn load_superblock(path: &Path) -> Result<btrfs_super_block, ScanError> {
    let mut f = File::open(path)?;
    f.seek(SeekFrom::Start(BTRFS_SUPER_INFO_OFFSET as u64))?;

    let mut buf = [0u8; BTRFS_SUPER_INFO_SIZE];
    f.read_exact(&mut buf)?;

    let sb = unsafe { std::ptr::read_unaligned(buf.as_ptr() as *const btrfs_super_block) };

    if sb.magic != BTRFS_MAGIC {
        return Err(ScanError::Format(format!(
            "invalid superblock magic: {:#x}",
            sb.magic
        )));
    }
    if !matches!(sb.csum_type, BtrfsCsumType::CRC32) {
        return Err(ScanError::Format(
            "only CRC32 superblock checksums are supported".into(),
        ));
    }
    if !checksum::verify_checksum(&buf, BTRFS_SUPER_INFO_SIZE) {
        return Err(ScanError::Format("superblock checksum mismatch".into()));
    }

    Ok(sb)
}

/// Iterates the superblock's bootstrap `sys_chunk_array`: a packed,
/// variable-stride run of (key, chunk, stripes...) tuples seeded so the
/// mapper can resolve the chunk tree's own blocks without having read the
/// chunk tree yet.
pub struct SysChunkIter<'a> {
    cursor: std::io::Cursor<&'a [u8]>,
    size: u64,
}

impl<'a> SysChunkIter<'a> {
    pub fn new(sb: &'a btrfs_super_block) -> SysChunkIter<'a> {
        SysChunkIter {
            cursor: std::io::Cursor::new(&sb.sys_chunk_array[..]),
            size: sb.sys_chunk_array_size as u64,
        }
    }
}

impl<'a> Iterator for SysChunkIter<'a> {
    type Item = ChunkInfo;

    fn next(&mut self) -> Option<ChunkInfo> {
        if self.cursor.position() >= self.size {
            return None;
        }

        let mut key_buf = [0u8; std::mem::size_of::<btrfs_disk_key>()];
        self.cursor.read_exact(&mut key_buf).ok()?;
        let key = unsafe { std::ptr::read_unaligned(key_buf.as_ptr() as *const btrfs_disk_key) };

        let mut chunk_buf = [0u8; std::mem::size_of::<btrfs_chunk>()];
        self.cursor.read_exact(&mut chunk_buf).ok()?;
        let chunk = unsafe { std::ptr::read_unaligned(chunk_buf.as_ptr() as *const btrfs_chunk) };

        let mut stripes = Vec::with_capacity(chunk.num_stripes as usize);
        for _ in 0..chunk.num_stripes {
            let mut stripe_buf = [0u8; std::mem::size_of::<btrfs_stripe>()];
            self.cursor.read_exact(&mut stripe_buf).ok()?;
            stripes.push(unsafe {
                std::ptr::read_unaligned(stripe_buf.as_ptr() as *const btrfs_stripe)
            });
        }

        Some(ChunkInfo {
            key,
            chunk,
            stripes,
        })
    }
}
