//! Random-access byte sources
//!
//! The lookup engine never walks a file sequentially. It needs exactly one
//! capability from its storage: "read N bytes at offset X", callable from many
//! threads at once. [`ByteSource`] captures that contract.
//!
//! Provided sources:
//!
//! - in-memory buffers (`Vec<u8>`, `Arc<[u8]>`)
//! - [`MmapSource`]: memory-mapped file, zero-copy reads
//! - [`FileSource`]: positional reads on a file descriptor (no shared cursor)
//! - [`CountingSource`]: wraps another source and counts reads
//!
//! A read that runs past the end of the source fails with
//! [`io::ErrorKind::UnexpectedEof`]; short reads are never returned silently.

use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Readable blob supporting concurrent positional reads
pub trait ByteSource: Send + Sync {
    /// Fill `buf` with the bytes starting at `offset`
    ///
    /// Must fail with `UnexpectedEof` if fewer than `buf.len()` bytes exist
    /// at `offset`.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()>;

    /// Total size in bytes, if known
    fn size(&self) -> Option<u64> {
        None
    }
}

fn eof(offset: u64, wanted: usize, size: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!(
            "read of {} bytes at offset {} exceeds source size {}",
            wanted, offset, size
        ),
    )
}

/// Shared implementation for every in-memory source
#[inline]
fn read_from_slice(data: &[u8], buf: &mut [u8], offset: u64) -> io::Result<()> {
    let start = usize::try_from(offset).map_err(|_| eof(offset, buf.len(), data.len()))?;
    let end = start
        .checked_add(buf.len())
        .filter(|end| *end <= data.len())
        .ok_or_else(|| eof(offset, buf.len(), data.len()))?;
    buf.copy_from_slice(&data[start..end]);
    Ok(())
}

impl ByteSource for Vec<u8> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        read_from_slice(self, buf, offset)
    }

    fn size(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl ByteSource for [u8] {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        read_from_slice(self, buf, offset)
    }

    fn size(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Arc<S> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        (**self).read_exact_at(buf, offset)
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }
}

/// Memory-mapped database file
///
/// Reads are plain memory copies out of the mapping, so the page cache is
/// shared between every process that opens the same file.
pub struct MmapSource {
    map: Mmap,
}

impl MmapSource {
    /// Map a file read-only
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_file(&file)
    }

    /// Map an already opened file
    pub fn from_file(file: &File) -> io::Result<Self> {
        // SAFETY: the mapping is read-only. Truncating the file underneath a
        // live mapping is outside what this crate can defend against, the
        // same caveat every mmap-backed reader carries.
        let map = unsafe { Mmap::map(file)? };
        Ok(Self { map })
    }

    /// Mapped bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }
}

impl ByteSource for MmapSource {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        read_from_slice(&self.map, buf, offset)
    }

    fn size(&self) -> Option<u64> {
        Some(self.map.len() as u64)
    }
}

/// File read with positional I/O
///
/// Each read carries its own offset (`pread`), so concurrent lookups never
/// contend on a shared file cursor.
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    /// Open a file for positional reads
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::from_file(File::open(path)?)
    }

    /// Wrap an already opened file
    pub fn from_file(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    #[cfg(unix)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.file.seek_read(buf, offset) {
                Ok(0) => return Err(eof(offset, buf.len(), self.len as usize)),
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn size(&self) -> Option<u64> {
        Some(self.len)
    }
}

/// Source wrapper that counts reads and bytes read
///
/// Used to verify cache behavior: a lookup served from the decode cache must
/// not touch the string region again.
pub struct CountingSource<S> {
    inner: S,
    reads: AtomicU64,
    bytes: AtomicU64,
}

impl<S: ByteSource> CountingSource<S> {
    /// Wrap `inner`
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Number of `read_exact_at` calls so far
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of bytes requested so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Zero both counters
    pub fn reset_counts(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
    }

    /// Wrapped source
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: ByteSource> ByteSource for CountingSource<S> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(buf.len() as u64, Ordering::Relaxed);
        self.inner.read_exact_at(buf, offset)
    }

    fn size(&self) -> Option<u64> {
        self.inner.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_slice_reads() {
        let data: Vec<u8> = (0u8..16).collect();
        let mut buf = [0u8; 4];
        data.read_exact_at(&mut buf, 2).unwrap();
        assert_eq!(buf, [2, 3, 4, 5]);

        data.read_exact_at(&mut buf, 12).unwrap();
        assert_eq!(buf, [12, 13, 14, 15]);

        let err = data.read_exact_at(&mut buf, 13).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err = data.read_exact_at(&mut buf, u64::MAX).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_empty_read_at_end_succeeds() {
        let data: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);
        let mut buf = [0u8; 0];
        data.read_exact_at(&mut buf, 3).unwrap();
    }

    #[test]
    fn test_file_and_mmap_sources_agree() {
        let mut file = NamedTempFile::new().unwrap();
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        file.write_all(&payload).unwrap();
        file.flush().unwrap();

        let fs = FileSource::open(file.path()).unwrap();
        let ms = MmapSource::open(file.path()).unwrap();
        assert_eq!(fs.size(), Some(1000));
        assert_eq!(ms.size(), Some(1000));

        let mut a = [0u8; 10];
        let mut b = [0u8; 10];
        fs.read_exact_at(&mut a, 500).unwrap();
        ms.read_exact_at(&mut b, 500).unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[..], &payload[500..510]);

        assert_eq!(
            fs.read_exact_at(&mut a, 995).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
        assert_eq!(
            ms.read_exact_at(&mut b, 995).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_counting_source() {
        let src = CountingSource::new(vec![0u8; 64]);
        let mut buf = [0u8; 8];
        src.read_exact_at(&mut buf, 0).unwrap();
        src.read_exact_at(&mut buf, 8).unwrap();
        assert_eq!(src.reads(), 2);
        assert_eq!(src.bytes_read(), 16);

        // Failed reads still count as attempts
        let _ = src.read_exact_at(&mut buf, 60);
        assert_eq!(src.reads(), 3);

        src.reset_counts();
        assert_eq!(src.reads(), 0);
        assert_eq!(src.bytes_read(), 0);
    }
}
