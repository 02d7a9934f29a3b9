use anyhow::{Context, Result};
use ip2geo::{CachePolicy, Entry, Field, FieldMask, IpVersion};
use serde_json::json;
use std::io::{self, Write};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cli_utils::{entry_json, last_before, open_database};
use crate::DumpFormat;

/// First address, last address, decoded entry
type Range = (IpAddr, IpAddr, Entry);

pub fn cmd_dump(
    database: PathBuf,
    ip_version: String,
    fields: Vec<Field>,
    format: DumpFormat,
    limit: Option<usize>,
) -> Result<()> {
    let db = open_database(&database, &fields, CachePolicy::Unbounded, CachePolicy::Disabled)?;
    let version: u8 = ip_version.parse().context("Invalid --ip-version")?;
    let version = IpVersion::try_from(version)?;
    let columns = db.fields();

    // The last row only closes the previous range; empty ranges own nothing.
    let ranges = db
        .iter(version, &fields)?
        .filter_map(|item| match item {
            Ok((entry, low, high)) => high
                .filter(|h| *h > low)
                .map(|h| Ok((low, last_before(h), entry))),
            Err(e) => Some(Err(e)),
        })
        .take(limit.unwrap_or(usize::MAX));

    let stdout = io::stdout();
    match format {
        DumpFormat::Csv => write_csv(stdout.lock(), &columns, ranges),
        DumpFormat::Ndjson => write_ndjson(stdout.lock(), &columns, ranges),
    }
}

fn write_csv<W, I>(out: W, columns: &[Field], ranges: I) -> Result<()>
where
    W: Write,
    I: Iterator<Item = ip2geo::Result<Range>>,
{
    let mut w = csv::Writer::from_writer(out);
    let mut header = vec!["ip_from", "ip_to"];
    header.extend(columns.iter().map(|f| f.key()));
    w.write_record(&header)?;

    for range in ranges {
        let (low, to, entry) = range.context("Failed to decode row")?;
        let mut record = vec![low.to_string(), to.to_string()];
        record.extend(columns.iter().map(|f| entry.get(*f).to_string()));
        w.write_record(&record)?;
    }
    w.flush()?;
    Ok(())
}

fn write_ndjson<W, I>(out: W, columns: &[Field], ranges: I) -> Result<()>
where
    W: Write,
    I: Iterator<Item = ip2geo::Result<Range>>,
{
    let mask: FieldMask = columns.iter().copied().collect();
    let mut out = io::BufWriter::new(out);
    for range in ranges {
        let (low, to, entry) = range.context("Failed to decode row")?;
        let mut value = entry_json(&low.to_string(), &entry, mask);
        value["ip_to"] = json!(to.to_string());
        serde_json::to_writer(&mut out, &value)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
