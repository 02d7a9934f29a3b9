//! ip2geo - Read-only IP geolocation lookups over BIN databases
//!
//! ip2geo answers "where is this address?" against IP2Location-style BIN
//! files. A file carries a small header, one row block per IP version and a
//! pool of length-prefixed strings. On open, both row blocks are read into
//! memory in a single positional read each; every lookup after that is a
//! binary search over memory plus a handful of small reads for string fields,
//! most of which are served from a cache.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ip2geo::{Database, Field};
//!
//! let db = Database::open("IP2LOCATION-LITE-DB11.BIN")?;
//! println!("{} built {}", db.kind(), db.date());
//!
//! if let Some(entry) = db.lookup("8.8.8.8".parse()?)? {
//!     println!("{} {} ({}, {})", entry.country, entry.city, entry.latitude, entry.longitude);
//! }
//!
//! // Decode only what you need
//! let entry = db.lookup_fields("2001:4860::1".parse()?, &[Field::Country])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  BIN file                            │
//! ├──────────────────────────────────────┤
//! │  1. Header (kind, date, row tables)  │
//! │  2. IPv4 rows (prefix + slots)       │
//! │  3. IPv6 rows (prefix + slots)       │
//! │  4. String pool ([len][bytes])       │
//! └──────────────────────────────────────┘
//!          ↓ open: two bulk reads (parallel)
//! ┌──────────────────────────────────────┐
//! │  RowIndex v4 / v6 (in memory)        │
//! │  binary search → row → FieldDecoder  │
//! │  → DecodeCache (strings, entries)    │
//! └──────────────────────────────────────┘
//! ```
//!
//! The handle is `Send + Sync`. [`Database::reset`] swaps in a freshly
//! loaded file atomically while lookups keep running.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Decode caches and their backing stores
pub mod cache;
/// Database handle and open options
pub mod database;
pub mod decoder;
pub mod endian;
/// Decoded records
pub mod entry;
/// Error types
pub mod error;
/// Field catalog, kinds and projections
pub mod fields;
pub mod header;
pub mod input;
pub mod lookup;
pub mod rows;
pub mod source;

pub use crate::cache::{CachePolicy, CacheStats};
pub use crate::database::{Database, EntryIter, OpenOptions};
pub use crate::entry::{Entry, FieldValue};
pub use crate::error::{GeoError, Result};
pub use crate::fields::{EntryKind, Field, FieldMask, ParseFieldError};
pub use crate::header::{BuildDate, IpVersion};
pub use crate::lookup::{normalize_address, LookupKey};
pub use crate::source::{ByteSource, CountingSource, FileSource, MmapSource};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library major version
pub const VERSION_MAJOR: u32 = 0;

/// Library minor version
pub const VERSION_MINOR: u32 = 3;

/// Library patch version
pub const VERSION_PATCH: u32 = 0;
