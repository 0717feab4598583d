//! Synthetic device image builder shared by the integration tests.
//!
//! `build_image`'s bootstrap chunk maps logical offset `L` to physical
//! offset `BOOTSTRAP_STRIPE_OFFSET + L` rather than identity-mapping —
//! a real device's first chunk can start anywhere, and a non-zero
//! stripe offset keeps bootstrap-mapped tree-root blocks (which can sit
//! at any logical address, including ones numerically equal to the
//! superblock's own 64 KiB offset) from landing physically on top of
//! the superblock itself.

use btrfs_salvage::checksum;
use btrfs_salvage::codec::{encode_header, HeaderFields};
use btrfs_salvage::structures::*;

pub const NODESIZE: u32 = 4096;
pub const SECTORSIZE: u32 = 4096;

/// Physical offset the bootstrap chunk's single stripe starts at.
/// Chosen well past `BTRFS_SUPER_INFO_OFFSET + BTRFS_SUPER_INFO_SIZE` so
/// no logical address a test writes a block at can alias the superblock.
pub const BOOTSTRAP_STRIPE_OFFSET: u64 = 0x100000;

fn default_dev_item(devid: u64) -> btrfs_dev_item {
    btrfs_dev_item {
        devid,
        total_bytes: 0,
        bytes_used: 0,
        io_align: SECTORSIZE,
        io_width: SECTORSIZE,
        sector_size: SECTORSIZE,
        r#type: 0,
        generation: 0,
        start_offset: 0,
        dev_group: 0,
        seek_speed: 0,
        bandwidth: 0,
        uuid: [0u8; BTRFS_UUID_SIZE],
        fsid: [1u8; BTRFS_FSID_SIZE],
    }
}

fn default_root_backup() -> btrfs_root_backup {
    btrfs_root_backup {
        tree_root: 0,
        tree_root_gen: 0,
        chunk_root: 0,
        chunk_root_gen: 0,
        extent_root: 0,
        extent_root_gen: 0,
        fs_root: 0,
        fs_root_gen: 0,
        dev_root: 0,
        dev_root_gen: 0,
        csum_root: 0,
        csum_root_gen: 0,
        total_bytes: 0,
        bytes_used: 0,
        num_devices: 0,
        unused_64: [0; 4],
        tree_root_level: 0,
        chunk_root_level: 0,
        extent_root_level: 0,
        fs_root_level: 0,
        dev_root_level: 0,
        csum_root_level: 0,
        unused_8: [0; 10],
    }
}

/// Byte-encode a single bootstrap chunk entry (key + chunk + one stripe),
/// the same layout `SysChunkIter` parses out of `sys_chunk_array`. The
/// chunk covers logical `[0, chunk_length)`, stored at physical
/// `stripe_offset`.
fn encode_bootstrap_chunk(buf: &mut [u8], devid: u64, chunk_length: u64, stripe_offset: u64) -> usize {
    let key = btrfs_disk_key {
        objectid: BTRFS_FIRST_CHUNK_TREE_OBJECTID,
        item_type: BtrfsItemType::CHUNK_ITEM,
        offset: 0,
    };
    let key_bytes = unsafe {
        std::slice::from_raw_parts(
            &key as *const _ as *const u8,
            std::mem::size_of::<btrfs_disk_key>(),
        )
    };
    let chunk_and_stripe = encode_chunk_item_data(devid, chunk_length, stripe_offset);

    let mut pos = 0;
    buf[pos..pos + key_bytes.len()].copy_from_slice(key_bytes);
    pos += key_bytes.len();
    buf[pos..pos + chunk_and_stripe.len()].copy_from_slice(&chunk_and_stripe);
    pos += chunk_and_stripe.len();
    pos
}

/// Build a synthetic single-device btrfs image: a valid, checksummed
/// primary superblock with a single bootstrap chunk covering logical
/// `[0, image_len)`, stored physically at `BOOTSTRAP_STRIPE_OFFSET`.
/// Callers write tree-root blocks into the returned buffer via
/// `write_tree_root_block`, which applies the same translation.
pub fn build_image(image_len: usize, generation: u64, root: u64, root_level: u8) -> Vec<u8> {
    build_image_ex(
        image_len,
        generation,
        root,
        root_level,
        0,
        image_len as u64,
        BOOTSTRAP_STRIPE_OFFSET,
    )
}

/// Like `build_image`, but the bootstrap chunk only covers
/// `[0, bootstrap_length)`, is stored at the given physical
/// `bootstrap_stripe_offset`, and `chunk_root` is set explicitly — for
/// fixtures that need the scanner to fall back to a real chunk-tree
/// lookup for offsets the bootstrap array doesn't cover. The returned
/// buffer is grown as needed to hold the bootstrap chunk's physical
/// region even when that's larger than `image_len`.
pub fn build_image_ex(
    image_len: usize,
    generation: u64,
    root: u64,
    root_level: u8,
    chunk_root: u64,
    bootstrap_length: u64,
    bootstrap_stripe_offset: u64,
) -> Vec<u8> {
    let physical_len =
        (image_len as u64).max(bootstrap_stripe_offset + bootstrap_length) as usize;
    let mut image = vec![0u8; physical_len];

    let devid = 1;
    let mut sys_chunk_array = [0u8; BTRFS_SYSTEM_CHUNK_ARRAY_SIZE];
    let sys_chunk_array_size =
        encode_bootstrap_chunk(&mut sys_chunk_array, devid, bootstrap_length, bootstrap_stripe_offset);

    let sb = btrfs_super_block {
        csum: [0u8; BTRFS_CSUM_SIZE],
        fsid: [1u8; BTRFS_FSID_SIZE],
        bytenr: BTRFS_SUPER_INFO_OFFSET as u64,
        flags: 0,
        magic: BTRFS_MAGIC,
        generation,
        root,
        chunk_root,
        log_root: 0,
        __unused_log_root_transid: 0,
        total_bytes: physical_len as u64,
        bytes_used: 0,
        root_dir_object_id: 0,
        num_devices: 1,
        sectorsize: SECTORSIZE,
        nodesize: NODESIZE,
        __unused_leafsize: NODESIZE,
        stripesize: SECTORSIZE,
        sys_chunk_array_size: sys_chunk_array_size as u32,
        chunk_root_generation: 0,
        compat_flags: 0,
        compat_ro_flags: 0,
        incompat_flags: 0,
        csum_type: BtrfsCsumType::CRC32,
        root_level,
        chunk_root_level: 0,
        log_root_level: 0,
        dev_item: default_dev_item(devid),
        label: [0u8; BTRFS_LABEL_SIZE],
        cache_generation: 0,
        uuid_tree_generation: 0,
        metadata_uuid: [1u8; BTRFS_FSID_SIZE],
        nr_global_roots: 0,
        reserved: [0u64; 27],
        sys_chunk_array,
        super_roots: [default_root_backup(); BTRFS_NUM_BACKUP_ROOTS],
        padding: [0u8; 565],
    };

    let sb_bytes = unsafe {
        std::slice::from_raw_parts(
            &sb as *const _ as *const u8,
            std::mem::size_of::<btrfs_super_block>(),
        )
    };
    let sb_start = BTRFS_SUPER_INFO_OFFSET;
    image[sb_start..sb_start + sb_bytes.len()].copy_from_slice(sb_bytes);

    let csum = checksum::compute_checksum(&image[sb_start..sb_start + BTRFS_SUPER_INFO_SIZE]);
    image[sb_start..sb_start + BTRFS_CSUM_SIZE].copy_from_slice(&csum);

    image
}

/// Write a checksummed, self-consistent metadata block header, placed in
/// the image at `physical_offset` and reporting `self_bytenr` as its own
/// logical address (the two coincide under an identity chunk mapping,
/// but differ when the block lives behind a non-identity stripe).
pub fn write_block_at(
    image: &mut [u8],
    physical_offset: u64,
    self_bytenr: u64,
    generation: u64,
    owner: u64,
    level: u8,
) {
    let offset = physical_offset as usize;
    let mut block = vec![0u8; NODESIZE as usize];
    let fields = HeaderFields {
        csum: [0u8; BTRFS_CSUM_SIZE],
        fsid: [1u8; 16],
        self_bytenr,
        flags: 0,
        chunk_tree_uuid: [0u8; 16],
        generation,
        owner,
        nritems: 0,
        level,
    };
    encode_header(&fields, &mut block);
    let csum = checksum::compute_checksum(&block);
    block[0..BTRFS_CSUM_SIZE].copy_from_slice(&csum);
    image[offset..offset + block.len()].copy_from_slice(&block);
}

/// Write a checksummed, self-consistent metadata block header at
/// `logical_offset`, translated through `build_image`'s bootstrap chunk
/// to its physical location (`BOOTSTRAP_STRIPE_OFFSET + logical_offset`).
pub fn write_tree_root_block(
    image: &mut [u8],
    logical_offset: u64,
    generation: u64,
    owner: u64,
    level: u8,
) {
    let physical_offset = BOOTSTRAP_STRIPE_OFFSET + logical_offset;
    write_block_at(image, physical_offset, logical_offset, generation, owner, level);
}

/// Translate a logical offset written via `write_tree_root_block` to the
/// physical offset it actually landed at, for tests that need to index
/// into the raw image buffer directly (e.g. to corrupt a byte).
pub fn physical_offset_of(logical_offset: u64) -> u64 {
    BOOTSTRAP_STRIPE_OFFSET + logical_offset
}

/// Byte-encode a `(btrfs_chunk, [btrfs_stripe])` pair the way
/// `mapper::parse_chunk_item` expects to find it in a `CHUNK_ITEM`'s data
/// region: the fixed chunk fields followed directly by `num_stripes`
/// stripe entries.
pub fn encode_chunk_item_data(devid: u64, chunk_length: u64, stripe_physical_offset: u64) -> Vec<u8> {
    let chunk = btrfs_chunk {
        length: chunk_length,
        owner: BTRFS_EXTENT_TREE_OBJECTID,
        stripe_len: chunk_length,
        r#type: 0,
        io_align: SECTORSIZE,
        io_width: SECTORSIZE,
        sector_size: SECTORSIZE,
        num_stripes: 1,
        sub_stripes: 1,
    };
    let stripe = btrfs_stripe {
        devid,
        offset: stripe_physical_offset,
        dev_uuid: [0u8; BTRFS_UUID_SIZE],
    };

    let mut out = Vec::new();
    unsafe {
        out.extend_from_slice(std::slice::from_raw_parts(
            &chunk as *const _ as *const u8,
            std::mem::size_of::<btrfs_chunk>(),
        ));
        out.extend_from_slice(std::slice::from_raw_parts(
            &stripe as *const _ as *const u8,
            std::mem::size_of::<btrfs_stripe>(),
        ));
    }
    out
}

/// Write a single-item chunk-tree leaf at `physical_offset` (== logical
/// offset; chunk tree blocks themselves live inside the bootstrap-mapped
/// region in every fixture here), holding one `CHUNK_ITEM` keyed at
/// `chunk_start` with the given data payload.
pub fn write_chunk_tree_leaf(
    image: &mut [u8],
    physical_offset: u64,
    generation: u64,
    chunk_start: u64,
    item_data: &[u8],
) {
    let header_size = std::mem::size_of::<btrfs_header>();
    let item_size = std::mem::size_of::<btrfs_item>();

    let mut block = vec![0u8; NODESIZE as usize];

    let key = btrfs_disk_key {
        objectid: BTRFS_FIRST_CHUNK_TREE_OBJECTID,
        item_type: BtrfsItemType::CHUNK_ITEM,
        offset: chunk_start,
    };
    let item = btrfs_item {
        key,
        offset: item_size as u32,
        size: item_data.len() as u32,
    };
    let item_bytes = unsafe {
        std::slice::from_raw_parts(&item as *const _ as *const u8, item_size)
    };
    block[header_size..header_size + item_size].copy_from_slice(item_bytes);
    let data_offset = header_size + item_size;
    block[data_offset..data_offset + item_data.len()].copy_from_slice(item_data);

    let fields = HeaderFields {
        csum: [0u8; BTRFS_CSUM_SIZE],
        fsid: [1u8; 16],
        self_bytenr: physical_offset,
        flags: 0,
        chunk_tree_uuid: [0u8; 16],
        generation,
        owner: BTRFS_CHUNK_TREE_OBJECTID,
        nritems: 1,
        level: 0,
    };
    encode_header(&fields, &mut block);
    let csum = checksum::compute_checksum(&block);
    block[0..BTRFS_CSUM_SIZE].copy_from_slice(&csum);

    let offset = physical_offset as usize;
    image[offset..offset + block.len()].copy_from_slice(&block);
}
