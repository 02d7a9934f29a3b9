//! Byte order helpers for the BIN layout
//!
//! All multi-byte integers and floats in the file are little-endian. Address
//! prefixes in the row blocks are stored least-significant byte first as well
//! and get reversed once at load time so that plain lexicographic comparison
//! of prefixes equals numeric address comparison.
//!
//! Nothing here depends on the host byte order.
//!
//! ```rust
//! use ip2geo::endian::{read_u32_le, read_f32_le, reverse_in_place};
//!
//! let buf = [0x78, 0x56, 0x34, 0x12, 0x00, 0x00, 0x80, 0x3f];
//! assert_eq!(read_u32_le(&buf, 0), Some(0x12345678));
//! assert_eq!(read_f32_le(&buf, 4), Some(1.0));
//! assert_eq!(read_u32_le(&buf, 6), None);
//!
//! let mut prefix = [4, 3, 2, 1];
//! reverse_in_place(&mut prefix);
//! assert_eq!(prefix, [1, 2, 3, 4]);
//! ```

/// Read a little-endian u32 at `offset`, `None` if out of bounds
#[inline(always)]
pub fn read_u32_le(buffer: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes: [u8; 4] = buffer.get(offset..end)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Read a little-endian IEEE-754 single at `offset`
///
/// The 4 bytes are taken as an integer bit pattern first and reinterpreted,
/// so NaN payloads survive unchanged.
#[inline(always)]
pub fn read_f32_le(buffer: &[u8], offset: usize) -> Option<f32> {
    read_u32_le(buffer, offset).map(f32::from_bits)
}

/// Reverse a stored address prefix into network (big-endian) order
#[inline]
pub fn reverse_in_place(prefix: &mut [u8]) {
    prefix.reverse();
}
