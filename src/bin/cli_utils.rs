use anyhow::{Context, Result};
use ip2geo::{CachePolicy, Database, Entry, Field, FieldMask};
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

/// Open a database for a CLI command, attaching the path to any error
pub fn open_database(
    path: &Path,
    fields: &[Field],
    string_cache: CachePolicy,
    entry_cache: CachePolicy,
) -> Result<Database> {
    Database::options()
        .fields(fields)
        .string_cache(string_cache)
        .entry_cache(entry_cache)
        .open(path)
        .with_context(|| format!("Failed to load database: {}", path.display()))
}

/// Mask of the fields a database decodes
pub fn field_mask(db: &Database) -> FieldMask {
    db.fields().into_iter().collect()
}

/// JSON object for a lookup result: `ip` first, then the decoded fields
pub fn entry_json(ip: &str, entry: &Entry, fields: FieldMask) -> Value {
    let mut out = json!({ "ip": ip });
    if let (Value::Object(map), Value::Object(values)) = (&mut out, entry.to_json(fields)) {
        map.extend(values);
    }
    out
}

/// Last address of the half-open range ending at `next`
pub fn last_before(next: IpAddr) -> IpAddr {
    match next {
        IpAddr::V4(v4) => IpAddr::V4(Ipv4Addr::from(u32::from(v4).saturating_sub(1))),
        IpAddr::V6(v6) => IpAddr::V6(Ipv6Addr::from(u128::from(v6).saturating_sub(1))),
    }
}

pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

pub fn format_rate(per_sec: f64) -> String {
    if per_sec >= 1_000_000.0 {
        format!("{:.2}M", per_sec / 1_000_000.0)
    } else if per_sec >= 1_000.0 {
        format!("{:.2}K", per_sec / 1_000.0)
    } else {
        format!("{:.2}", per_sec)
    }
}
