//! Positioned, cursor-free reads against the raw disk image.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// A read-only handle on an ext2 disk image.
///
/// Every read carries its own absolute byte offset, so the underlying file
/// descriptor can be used from anywhere without serializing on a shared
/// cursor.
pub struct Image {
    file: File,
}

impl Image {
    /// Opens `path` read-only. Does not touch the filesystem layout inside.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self { file })
    }

    /// Reads exactly `buf.len()` bytes starting at absolute offset `off`.
    ///
    /// A short read is reported as [`io::ErrorKind::UnexpectedEof`].
    pub fn read_exact_at(&self, buf: &mut [u8], off: u64) -> io::Result<()> {
        self.file.read_exact_at(buf, off)
    }

    /// Best-effort read of up to `buf.len()` bytes at `off`, returning the
    /// number of bytes actually read (may be less than `buf.len()` near EOF).
    pub fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        self.file.read_at(buf, off)
    }
}
