//! Checksum verifier: authenticates a metadata block's contents.
//!
//! The implementation must agree bit-exactly with the filesystem's on-disk
//! format: CRC32C-Castagnoli, initial value all-ones, folded over
//! `block[CHECKSUM_SIZE..block_len]`, result left-aligned into a
//! `CHECKSUM_SIZE`-byte field with the remainder zero-padded.

use crate::structures::{BtrfsCsum, BTRFS_CSUM_SIZE};
use crc::{Crc, CRC_32_ISCSI};

const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Compute the stored-checksum-field value for `block[CHECKSUM_SIZE..]`.
pub fn compute_checksum(block: &[u8]) -> BtrfsCsum {
    let mut result = [0u8; BTRFS_CSUM_SIZE];
    let crc = CASTAGNOLI.checksum(&block[BTRFS_CSUM_SIZE..]);
    result[0..4].copy_from_slice(&crc.to_le_bytes());
    result
}

/// Verify that `block`'s stored checksum (its first `CHECKSUM_SIZE` bytes)
/// matches the CRC32C of `block[CHECKSUM_SIZE..block_len]`.
///
/// `block` must be at least `block_len` bytes long; only the first
/// `block_len` bytes are considered (a buffer may be larger, e.g. a whole
/// read stride covering several nodesize-sized blocks).
pub fn verify_checksum(block: &[u8], block_len: usize) -> bool {
    debug_assert!(block.len() >= block_len);
    debug_assert!(block_len >= BTRFS_CSUM_SIZE);
    let stored = &block[0..BTRFS_CSUM_SIZE];
    let computed = compute_checksum(&block[0..block_len]);
    stored == computed
}
