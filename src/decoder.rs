//! Field decoding
//!
//! A row's slot block is a sequence of 4-byte little-endian words, one per
//! schema field. Numeric fields (latitude, longitude, elevation) store the
//! IEEE-754 bit pattern directly. Every other field stores an absolute file
//! offset into the string region, where a string is laid out as
//!
//! ```text
//! [len: u8][len bytes]
//! ```
//!
//! with no terminator. Skipped slots in a [`Projection`] are stepped over
//! without touching the source.

use crate::cache::DecodeCache;
use crate::endian::read_u32_le;
use crate::entry::Entry;
use crate::error::{GeoError, Result};
use crate::fields::Projection;
use crate::source::ByteSource;
use std::sync::Arc;

/// Read the length-prefixed string stored at `offset`, bypassing any cache
pub fn read_string_at<S: ByteSource + ?Sized>(source: &S, offset: u32) -> Result<Arc<str>> {
    let pos = u64::from(offset);
    let mut len = [0u8; 1];
    source.read_exact_at(&mut len, pos)?;
    let mut buf = vec![0u8; len[0] as usize];
    source.read_exact_at(&mut buf, pos + 1)?;
    Ok(match String::from_utf8(buf) {
        Ok(s) => Arc::from(s),
        Err(e) => Arc::from(String::from_utf8_lossy(e.as_bytes())),
    })
}

/// Decodes slot blocks into [`Entry`] values through a string cache
pub struct FieldDecoder<'a, S: ?Sized> {
    source: &'a S,
    cache: &'a DecodeCache,
}

impl<'a, S: ByteSource + ?Sized> FieldDecoder<'a, S> {
    /// Decoder reading strings from `source`, memoized in `cache`
    pub fn new(source: &'a S, cache: &'a DecodeCache) -> Self {
        Self { source, cache }
    }

    /// String at `offset`, served from the cache when possible
    pub fn string(&self, offset: u32) -> Result<Arc<str>> {
        self.cache
            .string(offset, || read_string_at(self.source, offset))
    }

    /// Decode the slots of one row
    ///
    /// Every slot of the schema must be present, projected or not; a block
    /// shorter than `4 * slots` fails with [`GeoError::ShortBuffer`].
    pub fn decode(&self, projection: &Projection, data: &[u8]) -> Result<Entry> {
        let mut entry = Entry::default();
        for (n, slot) in projection.slots().iter().enumerate() {
            let at = n * 4;
            let word = read_u32_le(data, at).ok_or(GeoError::ShortBuffer {
                needed: at + 4,
                available: data.len(),
            })?;
            let Some(field) = *slot else {
                continue;
            };
            if field.is_numeric() {
                entry.set_float(field, f32::from_bits(word));
            } else {
                let s = self.string(word)?;
                entry.set_str(field, &*s);
            }
        }
        Ok(entry)
    }
}
