use anyhow::{Context, Result};
use ip2geo::{CachePolicy, Field};
use serde_json::{json, Value};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cli_utils::{entry_json, field_mask, open_database};

pub fn cmd_query(database: PathBuf, addrs: Vec<String>, fields: Vec<Field>, quiet: bool) -> Result<()> {
    let db = open_database(&database, &fields, CachePolicy::Unbounded, CachePolicy::Disabled)?;
    let mask = field_mask(&db);

    let mut results = Vec::with_capacity(addrs.len());
    let mut all_found = true;
    for text in &addrs {
        let addr: IpAddr = text
            .trim()
            .parse()
            .with_context(|| format!("Not an IP address: {}", text))?;
        let entry = db
            .lookup(addr)
            .with_context(|| format!("Lookup failed for: {}", text))?;
        match entry {
            Some(entry) => results.push(entry_json(text, &entry, mask)),
            None => {
                all_found = false;
                results.push(json!({ "ip": text, "found": false }));
            }
        }
    }

    if !quiet {
        println!("{}", serde_json::to_string_pretty(&Value::Array(results))?);
    }

    std::process::exit(if all_found { 0 } else { 1 });
}
