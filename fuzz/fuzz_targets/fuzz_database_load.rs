#![no_main]
use libfuzzer_sys::fuzz_target;
use ip2geo::{Database, IpVersion};

fuzz_target!(|data: &[u8]| {
    // Garbage must produce errors, never panics or runaway allocations
    let Ok(db) = Database::from_bytes(data.to_vec()) else {
        return;
    };
    for addr in ["0.0.0.0", "8.8.8.8", "255.255.255.255", "::1", "2001:db8::1"] {
        let _ = db.lookup(addr.parse().unwrap());
    }
    for version in [IpVersion::V4, IpVersion::V6] {
        if let Ok(rows) = db.iter(version, &[]) {
            for row in rows.take(64) {
                let _ = row;
            }
        }
    }
});
