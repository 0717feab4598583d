//! Filesystem bootstrap: opens the devices the operator names, reads and
//! cross-checks each one's superblock, and assembles the `FsInfo` the
//! mapper and tree walker need.
//!
//! Mirrors (in spirit, not in depth) what `btrfs_scan_one_device` +
//! `btrfs_open_devices` + `btrfs_read_dev_super` do upstream: this
//! programme requires the user to name every available device and trusts
//! that the superblock on each one is valid — there is no libblkid-style
//! device discovery here; device enumeration is left to the caller.

use crate::device::FileDevice;
use crate::error::ScanError;
use crate::mapped_file::MappedFile;
use crate::structures::*;
use crate::superblock::{load_superblock, ChunkInfo, SysChunkIter};
use crate::tree::{BtrfsTreeIter, NodeSearchOption};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

pub struct DeviceInfo {
    pub path: PathBuf,
    /// memory-mapped view, used by the mapper/tree walker for the small,
    /// repeated random-access reads needed to resolve the chunk tree.
    pub file: MappedFile,
    /// positional-read handle, used by the scanner's own sweep.
    pub device: FileDevice,
    pub devid: LE64,
    pub dev_uuid: BtrfsUuid,
}

/// processed info about the filesystem, assembled from every device the
/// caller named.
pub struct FsInfo {
    pub fsid: BtrfsFsid,
    pub devid_map: HashMap<LE64, Rc<DeviceInfo>>,
    pub master_sb: btrfs_super_block,
    pub bootstrap_chunks: Vec<ChunkInfo>,
}

impl FsInfo {
    pub fn search_node(&self, tree_root: LE64, options: &NodeSearchOption) -> BtrfsTreeIter {
        BtrfsTreeIter::new(self, tree_root, *options)
    }
}

/// Open every device named on the command line, validate that they agree
/// on fsid and device count, and assemble an `FsInfo` ready for the
/// mapper.
pub fn load_fs(paths: &[PathBuf]) -> Result<FsInfo, ScanError> {
    let mut fsid: Option<BtrfsFsid> = None;
    let mut devid_map = HashMap::<LE64, Rc<DeviceInfo>>::new();
    let mut master_sb: Option<btrfs_super_block> = None;
    let mut bootstrap_chunks = Vec::new();

    for path in paths {
        let sb = load_superblock(path)?;

        match fsid {
            None => fsid = Some(sb.fsid),
            Some(f) if f != sb.fsid => {
                return Err(ScanError::Format(format!(
                    "{}: fsid does not match previously opened devices",
                    path.display()
                )))
            }
            Some(_) => {}
        }

        if let Some(prev_sb) = &master_sb {
            if prev_sb.num_devices != sb.num_devices {
                return Err(ScanError::Format(format!(
                    "{}: num_devices disagrees with previously opened devices",
                    path.display()
                )));
            }
        }

        let file = MappedFile::open(path).map_err(|e| ScanError::Io(to_io_error(e)))?;
        let device = FileDevice::open(path)?;
        let di = Rc::new(DeviceInfo {
            path: path.clone(),
            file,
            device,
            devid: sb.dev_item.devid,
            dev_uuid: sb.dev_item.uuid,
        });
        devid_map.insert(di.devid, Rc::clone(&di));

        if bootstrap_chunks.is_empty() {
            bootstrap_chunks.extend(SysChunkIter::new(&sb));
        }
        master_sb = Some(sb);
    }

    let master_sb =
        master_sb.ok_or_else(|| ScanError::Config("no devices provided".to_string()))?;

    Ok(FsInfo {
        fsid: fsid.unwrap(),
        devid_map,
        master_sb,
        bootstrap_chunks,
    })
}

fn to_io_error(e: anyhow::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}
