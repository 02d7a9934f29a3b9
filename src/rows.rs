//! Row store: bulk-loaded, fixed-stride row blocks
//!
//! Each IP version owns one contiguous block of rows:
//!
//! ```text
//! row = address prefix (4 or 16 bytes) ++ slot[0] ++ ... ++ slot[k-1]
//! stride = prefix_len + 4 * field_count(kind)
//! ```
//!
//! The whole block is read with a single positional read when the source
//! knows its size, and in bounded runs of whole rows when it does not. Load contract: after
//! [`RowIndex::load`] returns, every prefix is in network byte order, so byte
//! slices compare the same way the addresses they encode do. The file stores
//! them reversed.
//!
//! Rows are sorted ascending by prefix. Row `i` owns the half-open address
//! range `[prefix(i), prefix(i + 1))`; the last row is a sentinel that only
//! closes the range of the row before it.

use crate::endian::reverse_in_place;
use crate::error::{GeoError, Result};
use crate::fields::EntryKind;
use crate::header::{IpVersion, RowTable};
use crate::source::ByteSource;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Upper bound on one read when the source cannot report its size
const LOAD_CHUNK: usize = 4 << 20;

/// Immutable row block for one IP version
#[derive(Debug, Clone)]
pub struct RowIndex {
    version: IpVersion,
    rows: Box<[u8]>,
    stride: usize,
    count: usize,
}

impl RowIndex {
    /// Row block for a version absent from the file; every lookup misses
    pub fn empty(version: IpVersion, kind: EntryKind) -> Self {
        Self {
            version,
            rows: Box::default(),
            stride: row_stride(version, kind),
            count: 0,
        }
    }

    /// Read the row table for `version` and bulk-load its rows
    pub fn load<S: ByteSource + ?Sized>(
        source: &S,
        version: IpVersion,
        kind: EntryKind,
    ) -> Result<Self> {
        let table = RowTable::read(source, version)?;
        if table.is_empty() {
            return Ok(Self::empty(version, kind));
        }
        if table.offset == 0 {
            return Err(GeoError::Format(format!(
                "{} row block offset is 0 with {} rows (offsets are 1-based)",
                version, table.count
            )));
        }

        let stride = row_stride(version, kind);
        let start = u64::from(table.offset - 1);
        let len = (table.count as u64)
            .checked_mul(stride as u64)
            .ok_or_else(|| GeoError::Format(format!("{} row block size overflows", version)))?;

        // Refuse before allocating when the source already tells us the
        // block cannot fit.
        if let Some(size) = source.size() {
            if start.saturating_add(len) > size {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "{} row block [{}, {}) extends past end of source ({} bytes)",
                        version,
                        start,
                        start.saturating_add(len),
                        size
                    ),
                )
                .into());
            }
        }

        let len = usize::try_from(len)
            .map_err(|_| GeoError::Format(format!("{} row block too large", version)))?;

        // Sized sources are read in one go; unsized ones in bounded runs of
        // whole rows, so a bogus count reaches end of source first.
        let chunk = match source.size() {
            Some(_) => len,
            None => (LOAD_CHUNK / stride).max(1) * stride,
        };
        let mut rows = Vec::new();
        while rows.len() < len {
            let at = rows.len();
            let n = chunk.min(len - at);
            rows.try_reserve(n).map_err(|_| {
                GeoError::Format(format!(
                    "{} row block of {} bytes cannot be allocated",
                    version, len
                ))
            })?;
            rows.resize(at + n, 0);
            source.read_exact_at(&mut rows[at..], start + at as u64)?;
        }
        Self::from_stored(version, kind, rows)
    }

    /// Build an index from rows exactly as stored in the file
    ///
    /// Reverses every prefix into network order. `rows.len()` must be a
    /// multiple of the stride.
    pub fn from_stored(version: IpVersion, kind: EntryKind, mut rows: Vec<u8>) -> Result<Self> {
        let stride = row_stride(version, kind);
        if rows.len() % stride != 0 {
            return Err(GeoError::ShortBuffer {
                needed: rows.len().div_ceil(stride) * stride,
                available: rows.len(),
            });
        }
        let prefix_len = version.prefix_len();
        for row in rows.chunks_exact_mut(stride) {
            reverse_in_place(&mut row[..prefix_len]);
        }
        let count = rows.len() / stride;
        Ok(Self {
            version,
            rows: rows.into_boxed_slice(),
            stride,
            count,
        })
    }

    /// IP version of this block
    #[inline]
    pub fn version(&self) -> IpVersion {
        self.version
    }

    /// Bytes per row
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of rows, sentinel included
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when the version is absent from the file
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Heap bytes held by the block
    pub fn memory_size(&self) -> usize {
        self.rows.len()
    }

    /// Full row `i`
    #[inline]
    pub fn row(&self, i: usize) -> Option<&[u8]> {
        let start = i.checked_mul(self.stride)?;
        self.rows.get(start..start.checked_add(self.stride)?)
    }

    /// Normalized address prefix of row `i`
    #[inline]
    pub fn prefix(&self, i: usize) -> Option<&[u8]> {
        self.row(i).map(|r| &r[..self.version.prefix_len()])
    }

    /// Slot block of row `i` (everything after the prefix)
    #[inline]
    pub fn data(&self, i: usize) -> Option<&[u8]> {
        self.row(i).map(|r| &r[self.version.prefix_len()..])
    }

    /// Prefix of row `i` as an address
    pub fn address(&self, i: usize) -> Option<IpAddr> {
        let prefix = self.prefix(i)?;
        Some(match self.version {
            IpVersion::V4 => {
                let b: [u8; 4] = prefix.try_into().ok()?;
                IpAddr::V4(Ipv4Addr::from(b))
            }
            IpVersion::V6 => {
                let b: [u8; 16] = prefix.try_into().ok()?;
                IpAddr::V6(Ipv6Addr::from(b))
            }
        })
    }

    /// Row `i` with its address bounds
    pub fn range(&self, i: usize) -> Option<RowRange<'_>> {
        Some(RowRange {
            index: i,
            low: self.address(i)?,
            high: self.address(i + 1),
            data: self.data(i)?,
        })
    }

    /// Forward walk over every row with its address bounds
    pub fn ranges(&self) -> Ranges<'_> {
        Ranges {
            index: self,
            next: 0,
        }
    }
}

/// Bytes per row for a version and kind
#[inline]
pub fn row_stride(version: IpVersion, kind: EntryKind) -> usize {
    version.prefix_len() + 4 * kind.field_count()
}

/// One row seen by [`RowIndex::ranges`]
#[derive(Debug, Clone, Copy)]
pub struct RowRange<'a> {
    /// Row position in the block
    pub index: usize,
    /// Inclusive lower bound (this row's prefix)
    pub low: IpAddr,
    /// Exclusive upper bound (next row's prefix); `None` for the last row
    pub high: Option<IpAddr>,
    /// Slot block
    pub data: &'a [u8],
}

/// Iterator returned by [`RowIndex::ranges`]
pub struct Ranges<'a> {
    index: &'a RowIndex,
    next: usize,
}

impl<'a> Iterator for Ranges<'a> {
    type Item = RowRange<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let range = self.index.range(self.next)?;
        self.next += 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.index.len().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Ranges<'_> {}
