//! Error types for the ip2geo library
//!
//! Every fallible operation in the crate returns [`GeoError`]. Errors raised
//! while opening or resetting a database abort that operation and leave any
//! previously loaded state untouched; errors raised by a single lookup affect
//! only that lookup.

use crate::fields::Field;
use thiserror::Error;

/// Result type alias for ip2geo operations
pub type Result<T> = std::result::Result<T, GeoError>;

/// Main error type for ip2geo operations
#[derive(Error, Debug)]
pub enum GeoError {
    /// The kind byte in the header is not a known database layout
    #[error("unknown database format: kind {0}")]
    UnknownFormat(u8),

    /// A requested field is not part of the database kind's schema
    #[error("field {field} is not available in database kind {kind}")]
    UnsupportedField {
        /// Field that was requested
        field: Field,
        /// Kind id of the open database
        kind: u8,
    },

    /// Address is neither 4 nor 16 bytes long after normalization
    #[error("invalid address length: {0} bytes (expected 4 or 16)")]
    InvalidAddressVersion(usize),

    /// IP version selector other than 4 or 6
    #[error("invalid IP version: {0} (expected 4 or 6)")]
    InvalidIpVersion(u8),

    /// Row or string data is shorter than the layout requires
    #[error("short buffer: needed {needed} bytes, {available} available")]
    ShortBuffer {
        /// Bytes required by the layout
        needed: usize,
        /// Bytes actually present
        available: usize,
    },

    /// Header values that cannot describe a valid row block
    #[error("invalid format: {0}")]
    Format(String),

    /// I/O error from the byte source
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GeoError {
    /// True for errors that indicate a truncated or corrupt file
    pub fn is_truncation(&self) -> bool {
        match self {
            GeoError::ShortBuffer { .. } => true,
            GeoError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
