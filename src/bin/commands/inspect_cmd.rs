use anyhow::Result;
use ip2geo::{CachePolicy, IpVersion};
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_number, open_database};

pub fn cmd_inspect(database: PathBuf, json_output: bool) -> Result<()> {
    let db = open_database(&database, &[], CachePolicy::Disabled, CachePolicy::Disabled)?;

    let kind = db.kind();
    let fields = db.fields();
    let v4_rows = db.row_count(IpVersion::V4);
    let v6_rows = db.row_count(IpVersion::V6);

    if json_output {
        let output = json!({
            "file": database.display().to_string(),
            "kind": kind.id(),
            "name": kind.to_string(),
            "date": db.date().to_string(),
            "fields": fields.iter().map(|f| f.key()).collect::<Vec<_>>(),
            "ipv4_rows": v4_rows,
            "ipv6_rows": v6_rows,
            "row_bytes": db.row_memory(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database: {}", database.display());
    println!("Kind:     {} ({} fields)", kind, fields.len());
    println!("Built:    {}", db.date());
    println!();
    println!("Rows:");
    for (version, rows) in [(IpVersion::V4, v4_rows), (IpVersion::V6, v6_rows)] {
        if rows == 0 {
            println!("  {}:  ✗", version);
        } else {
            println!("  {}:  {}", version, format_number(rows));
        }
    }
    println!("  Memory: {}", format_bytes(db.row_memory()));
    println!();
    println!("Fields:");
    for field in &fields {
        println!("  {}", field);
    }
    Ok(())
}
