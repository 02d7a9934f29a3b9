//! BIN header parsing
//!
//! Layout of the first 21 bytes (all integers little-endian):
//!
//! ```text
//! offset  size  field
//! 0       1     kind id (1..=24)
//! 1       1     column count (unused)
//! 2       1     build year, two digits
//! 3       1     build month
//! 4       1     build day
//! 5       4     IPv4 row count
//! 9       4     IPv4 row block offset (1-based)
//! 13      4     IPv6 row count
//! 17      4     IPv6 row block offset (1-based)
//! ```
//!
//! The prologue (bytes 0..5) is parsed into a [`Header`]. The per-version row
//! tables are read separately by the row store through [`RowTable::read`].

use crate::error::{GeoError, Result};
use crate::fields::EntryKind;
use crate::source::ByteSource;
use serde::Serialize;
use std::fmt;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// Size of the fixed prologue
pub const PROLOGUE_LEN: usize = 5;

/// IP address family of a row block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IpVersion {
    /// 4-byte prefixes
    V4,
    /// 16-byte prefixes
    V6,
}

impl IpVersion {
    /// Bytes of address prefix at the head of every row
    #[inline]
    pub const fn prefix_len(self) -> usize {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 16,
        }
    }

    /// Header position of this version's row table
    #[inline]
    const fn table_offset(self) -> u64 {
        match self {
            IpVersion::V4 => 5,
            IpVersion::V6 => 13,
        }
    }

    /// Numeric version, 4 or 6
    pub const fn number(self) -> u8 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }
}

impl TryFrom<u8> for IpVersion {
    type Error = GeoError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            4 => Ok(IpVersion::V4),
            6 => Ok(IpVersion::V6),
            other => Err(GeoError::InvalidIpVersion(other)),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IPv{}", self.number())
    }
}

/// Build date stamped in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BuildDate {
    /// Full year (the file stores two digits; 2000 is added)
    pub year: u16,
    /// Month, 1..=12 in well-formed files
    pub month: u8,
    /// Day of month
    pub day: u8,
}

impl fmt::Display for BuildDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout, Unaligned)]
struct RawPrologue {
    kind: u8,
    columns: u8,
    year: u8,
    month: u8,
    day: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout, Unaligned)]
struct RawRowTable {
    count: U32,
    offset: U32,
}

/// Parsed prologue: kind and build date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Database kind
    pub kind: EntryKind,
    /// Column count byte as stored (address column plus fields). Row layout
    /// always follows `kind`.
    pub columns: u8,
    /// Build date
    pub date: BuildDate,
}

impl Header {
    /// Read and validate the 5-byte prologue
    pub fn read<S: ByteSource + ?Sized>(source: &S) -> Result<Self> {
        let mut buf = [0u8; PROLOGUE_LEN];
        source.read_exact_at(&mut buf, 0)?;
        Self::parse(&buf)
    }

    /// Parse a prologue already in memory
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (raw, _) = RawPrologue::read_from_prefix(bytes).map_err(|_| GeoError::ShortBuffer {
            needed: PROLOGUE_LEN,
            available: bytes.len(),
        })?;
        let kind = EntryKind::new(raw.kind).ok_or(GeoError::UnknownFormat(raw.kind))?;
        Ok(Header {
            kind,
            columns: raw.columns,
            date: BuildDate {
                year: 2000 + raw.year as u16,
                month: raw.month,
                day: raw.day,
            },
        })
    }
}

/// Row count and block position for one IP version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowTable {
    /// Number of rows, including the trailing sentinel
    pub count: u32,
    /// 1-based file offset of the first row
    pub offset: u32,
}

impl RowTable {
    /// Read the table for `version` from its fixed header position
    pub fn read<S: ByteSource + ?Sized>(source: &S, version: IpVersion) -> Result<Self> {
        let mut buf = [0u8; 8];
        source.read_exact_at(&mut buf, version.table_offset())?;
        let raw = RawRowTable::read_from_bytes(&buf[..]).map_err(|_| GeoError::ShortBuffer {
            needed: 8,
            available: buf.len(),
        })?;
        Ok(RowTable {
            count: raw.count.get(),
            offset: raw.offset.get(),
        })
    }

    /// True if this version has no rows in the file
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
