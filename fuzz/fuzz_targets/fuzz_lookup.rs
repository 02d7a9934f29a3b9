#![no_main]
use libfuzzer_sys::fuzz_target;
use ip2geo::{normalize_address, Database};
use std::sync::OnceLock;

/// DB1: [0.0.0.0 -> "AA"], sentinel [128.0.0.0]; [:: -> "AA"], sentinel [8000::]
fn database() -> &'static Database {
    static DB: OnceLock<Database> = OnceLock::new();
    DB.get_or_init(|| {
        let mut f = vec![1u8, 2, 24, 1, 1];
        let v4_at = 21u32;
        let v6_at = v4_at + 2 * 8;
        let pool_at = v6_at + 2 * 20;
        for word in [2, v4_at + 1, 2, v6_at + 1] {
            f.extend_from_slice(&word.to_le_bytes());
        }
        for first in [0u8, 128] {
            f.extend_from_slice(&[0, 0, 0, first]);
            f.extend_from_slice(&pool_at.to_le_bytes());
        }
        for first in [0u8, 128] {
            let mut prefix = [0u8; 16];
            prefix[15] = first;
            f.extend_from_slice(&prefix);
            f.extend_from_slice(&pool_at.to_le_bytes());
        }
        f.extend_from_slice(&[2, b'A', b'A']);
        Database::from_bytes(f).unwrap()
    })
}

fuzz_target!(|data: &[u8]| {
    let db = database();
    match normalize_address(data) {
        Ok(key) => {
            let found = db.lookup_bytes(data).unwrap();
            // Exactly the lower half of each address space is covered
            let covered = key.as_bytes()[0] < 128;
            assert_eq!(found.is_some(), covered, "{:?}", key);
        }
        Err(_) => assert!(data.len() != 4 && data.len() != 16),
    }
});
