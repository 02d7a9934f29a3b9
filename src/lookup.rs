//! Range lookup over a [`RowIndex`]
//!
//! The row block is a boundary table: row `i` holds the data for every
//! address in `[prefix(i), prefix(i + 1))`. A plain "greatest prefix not
//! above the key" search is not enough on its own, because the answer must
//! also have a successor row above the key. The last row is a sentinel and
//! owns nothing, and keys at or beyond it miss.
//!
//! Each probe therefore compares the key against both the probed row and its
//! successor.

use crate::error::{GeoError, Result};
use crate::header::IpVersion;
use crate::rows::RowIndex;
use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// First 12 bytes of an IPv4-mapped IPv6 address (`::ffff:0:0/96`)
pub const V4_MAPPED_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff];

/// Normalized query address in network byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKey {
    /// Searched in the IPv4 block
    V4([u8; 4]),
    /// Searched in the IPv6 block
    V6([u8; 16]),
}

impl LookupKey {
    /// Block this key is searched in
    #[inline]
    pub fn version(&self) -> IpVersion {
        match self {
            LookupKey::V4(_) => IpVersion::V4,
            LookupKey::V6(_) => IpVersion::V6,
        }
    }

    /// Key bytes compared against row prefixes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            LookupKey::V4(b) => b,
            LookupKey::V6(b) => b,
        }
    }

    /// Key as an address
    pub fn to_ip(&self) -> IpAddr {
        match *self {
            LookupKey::V4(b) => IpAddr::V4(Ipv4Addr::from(b)),
            LookupKey::V6(b) => IpAddr::V6(Ipv6Addr::from(b)),
        }
    }
}

impl From<IpAddr> for LookupKey {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => LookupKey::V4(v4.octets()),
            IpAddr::V6(v6) => fold_v6(v6.octets()),
        }
    }
}

impl From<Ipv4Addr> for LookupKey {
    fn from(addr: Ipv4Addr) -> Self {
        LookupKey::V4(addr.octets())
    }
}

impl From<Ipv6Addr> for LookupKey {
    fn from(addr: Ipv6Addr) -> Self {
        fold_v6(addr.octets())
    }
}

#[inline]
fn fold_v6(octets: [u8; 16]) -> LookupKey {
    if octets[..12] == V4_MAPPED_PREFIX {
        LookupKey::V4([octets[12], octets[13], octets[14], octets[15]])
    } else {
        LookupKey::V6(octets)
    }
}

/// Normalize a raw address in network byte order
///
/// 4-byte input is IPv4. 16-byte input is IPv6 unless it carries the
/// IPv4-mapped prefix, in which case it folds to its trailing 4 bytes. Any
/// other length fails with [`GeoError::InvalidAddressVersion`].
pub fn normalize_address(addr: &[u8]) -> Result<LookupKey> {
    if let Ok(v4) = <[u8; 4]>::try_from(addr) {
        return Ok(LookupKey::V4(v4));
    }
    if let Ok(v6) = <[u8; 16]>::try_from(addr) {
        return Ok(fold_v6(v6));
    }
    Err(GeoError::InvalidAddressVersion(addr.len()))
}

impl RowIndex {
    /// `key < prefix(i)`; rows past the end never compare above the key
    #[inline]
    fn key_below(&self, key: &[u8], i: usize) -> bool {
        match self.prefix(i) {
            Some(prefix) => key.cmp(prefix) == Ordering::Less,
            None => false,
        }
    }

    /// Index of the row whose range contains `key`
    ///
    /// `key` must be in network order and as long as this block's prefixes;
    /// anything else misses. Returns `None` for keys below the first row, at
    /// or above the sentinel, and for empty blocks.
    pub fn find(&self, key: &[u8]) -> Option<usize> {
        if key.len() != self.version().prefix_len() || self.is_empty() {
            return None;
        }
        // hi starts one past the last row; key_below treats that slot as
        // "not above the key", so the sentinel never matches.
        let (mut lo, mut hi) = (0usize, self.len());
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_below(key, mid) {
                if mid == 0 {
                    return None;
                }
                hi = mid - 1;
            } else {
                lo = mid + 1;
                if self.key_below(key, lo) {
                    return Some(mid);
                }
            }
        }
        None
    }

    /// [`find`](Self::find) for a normalized key; wrong-version keys miss
    pub fn find_key(&self, key: &LookupKey) -> Option<usize> {
        if key.version() != self.version() {
            return None;
        }
        self.find(key.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::EntryKind;

    fn v4_index(bounds: &[[u8; 4]]) -> RowIndex {
        let kind = EntryKind::new(1).unwrap();
        let mut rows = Vec::new();
        for (i, b) in bounds.iter().enumerate() {
            rows.extend(b.iter().rev());
            rows.extend_from_slice(&(i as u32).to_le_bytes());
        }
        RowIndex::from_stored(IpVersion::V4, kind, rows).unwrap()
    }

    fn find(idx: &RowIndex, ip: &str) -> Option<usize> {
        let addr: IpAddr = ip.parse().unwrap();
        idx.find_key(&LookupKey::from(addr))
    }

    #[test]
    fn test_single_range_with_sentinel() {
        let idx = v4_index(&[[0, 0, 0, 0], [1, 0, 0, 0]]);
        assert_eq!(find(&idx, "0.0.0.0"), Some(0));
        assert_eq!(find(&idx, "0.0.0.5"), Some(0));
        assert_eq!(find(&idx, "0.255.255.255"), Some(0));
        assert_eq!(find(&idx, "1.0.0.0"), None);
        assert_eq!(find(&idx, "2.0.0.0"), None);
    }

    #[test]
    fn test_boundaries_belong_to_upper_row() {
        let idx = v4_index(&[
            [10, 0, 0, 0],
            [10, 0, 1, 0],
            [10, 0, 2, 0],
            [10, 1, 0, 0],
            [11, 0, 0, 0],
        ]);
        assert_eq!(find(&idx, "9.255.255.255"), None);
        assert_eq!(find(&idx, "10.0.0.0"), Some(0));
        assert_eq!(find(&idx, "10.0.0.255"), Some(0));
        assert_eq!(find(&idx, "10.0.1.0"), Some(1));
        assert_eq!(find(&idx, "10.0.1.255"), Some(1));
        assert_eq!(find(&idx, "10.0.2.0"), Some(2));
        assert_eq!(find(&idx, "10.0.255.255"), Some(2));
        assert_eq!(find(&idx, "10.1.0.0"), Some(3));
        assert_eq!(find(&idx, "10.255.255.255"), Some(3));
        assert_eq!(find(&idx, "11.0.0.0"), None);
    }

    #[test]
    fn test_every_row_of_larger_table() {
        let bounds: Vec<[u8; 4]> = (0..=200u32).map(|i| (i * 1000).to_be_bytes()).collect();
        let idx = v4_index(&bounds);
        for i in 0..200u32 {
            let low = Ipv4Addr::from(i * 1000);
            let mid = Ipv4Addr::from(i * 1000 + 500);
            let last = Ipv4Addr::from(i * 1000 + 999);
            for a in [low, mid, last] {
                assert_eq!(idx.find_key(&a.into()), Some(i as usize), "{}", a);
            }
        }
        assert_eq!(idx.find_key(&Ipv4Addr::from(200_000).into()), None);
    }

    #[test]
    fn test_empty_ranges_are_skipped() {
        // Duplicate prefix: row 1 owns [5.0.0.0, 5.0.0.0), i.e. nothing
        let idx = v4_index(&[[1, 0, 0, 0], [5, 0, 0, 0], [5, 0, 0, 0], [9, 0, 0, 0]]);
        assert_eq!(find(&idx, "4.255.255.255"), Some(0));
        assert_eq!(find(&idx, "5.0.0.0"), Some(2));
        assert_eq!(find(&idx, "8.0.0.0"), Some(2));
    }

    #[test]
    fn test_empty_index_misses() {
        let idx = RowIndex::empty(IpVersion::V4, EntryKind::new(1).unwrap());
        assert_eq!(find(&idx, "1.2.3.4"), None);
    }

    #[test]
    fn test_wrong_version_key_misses() {
        let idx = v4_index(&[[0, 0, 0, 0], [255, 255, 255, 255]]);
        assert_eq!(find(&idx, "2001:db8::1"), None);
        assert_eq!(idx.find(&[1, 2, 3]), None);
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address(&[1, 2, 3, 4]).unwrap(), LookupKey::V4([1, 2, 3, 4]));

        let mut mapped = [0u8; 16];
        mapped[10] = 0xff;
        mapped[11] = 0xff;
        mapped[12..].copy_from_slice(&[203, 0, 113, 1]);
        assert_eq!(
            normalize_address(&mapped).unwrap(),
            LookupKey::V4([203, 0, 113, 1])
        );

        let v6: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert_eq!(
            normalize_address(&v6.octets()).unwrap(),
            LookupKey::V6(v6.octets())
        );

        assert!(matches!(
            normalize_address(&[1, 2, 3]),
            Err(GeoError::InvalidAddressVersion(3))
        ));
        assert!(matches!(
            normalize_address(&[0u8; 8]),
            Err(GeoError::InvalidAddressVersion(8))
        ));
    }

    #[test]
    fn test_mapped_ipaddr_folds() {
        let mapped: IpAddr = "::ffff:203.0.113.1".parse().unwrap();
        let key = LookupKey::from(mapped);
        assert_eq!(key.version(), IpVersion::V4);
        assert_eq!(key.to_ip().to_string(), "203.0.113.1");
    }
}
