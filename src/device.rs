//! Device access: positional reads of physical offsets on a block device
//! or plain file, standing in for the filesystem's own `pread`-based I/O
//! path (`find_root`'s `pread64` loop).
//!
//! Kept deliberately separate from `mapped_file::MappedFile`: the mapper
//! uses a memory-mapped view to conveniently resolve the chunk tree and
//! walk B-tree nodes (random, small, repeated accesses), while the
//! scanner's own sweep issues sequential positional reads one stride at a
//! time, matching `pread64(fd, iobuf, iobuf_size, bytenr)` and its
//! associated short-read/EOF handling.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// A read-only, positional-read capable handle onto a device or file.
pub trait BlockDevice {
    /// Read up to `buf.len()` bytes starting at `offset`. Returns the
    /// number of bytes actually read, which may be less than `buf.len()`
    /// at end-of-device (never an error by itself).
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// The most common backend: an already-open file or block device,
/// opened read-only.
pub struct FileDevice {
    path: PathBuf,
    file: File,
}

impl FileDevice {
    pub fn open(path: &Path) -> io::Result<FileDevice> {
        let file = File::open(path)?;
        Ok(FileDevice {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileDevice {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        // std's read_at already stops at EOF and returns a short count
        // rather than erroring, matching pread64's short-read semantics.
        loop_read_at(&self.file, offset, buf)
    }
}

fn loop_read_at(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    // A single read_at call is not guaranteed to fill the buffer even
    // mid-device (interrupted syscalls, pipe-like devices); keep reading
    // until either the buffer is full or nothing more came back.
    let mut total = 0usize;
    while total < buf.len() {
        match file.read_at(&mut buf[total..], offset + total as u64) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
