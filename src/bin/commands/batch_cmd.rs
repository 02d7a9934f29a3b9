use anyhow::{Context, Result};
use ip2geo::{input, CachePolicy, Field};
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::cli_utils::{entry_json, field_mask, format_number, format_rate, open_database};

#[derive(Default)]
struct BatchStats {
    lines: usize,
    found: usize,
    missing: usize,
    invalid: usize,
    failed: usize,
}

pub fn cmd_batch(
    database: PathBuf,
    inputs: Vec<PathBuf>,
    fields: Vec<Field>,
    cache_size: Option<usize>,
    entry_cache: bool,
    show_stats: bool,
) -> Result<()> {
    let string_cache = cache_size.map_or(CachePolicy::Unbounded, CachePolicy::with_capacity);
    let entry_cache = if entry_cache {
        CachePolicy::Unbounded
    } else {
        CachePolicy::Disabled
    };
    let db = open_database(&database, &fields, string_cache, entry_cache)?;
    let mask = field_mask(&db);

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut stats = BatchStats::default();
    let started = Instant::now();

    for path in &inputs {
        let reader = input::open(path)
            .with_context(|| format!("Failed to open input: {}", path.display()))?;
        info!(input = %path.display(), "reading addresses");

        for line in input::addresses(reader) {
            let line = line.with_context(|| format!("Failed to read: {}", path.display()))?;
            stats.lines += 1;

            let Some(addr) = line.addr else {
                stats.invalid += 1;
                warn!(input = %path.display(), line = line.number, text = %line.text, "not an IP address");
                serde_json::to_writer(&mut out, &json!({ "ip": line.text, "error": "invalid address" }))?;
                out.write_all(b"\n")?;
                continue;
            };

            match db.lookup(addr) {
                Ok(Some(entry)) => {
                    stats.found += 1;
                    serde_json::to_writer(&mut out, &entry_json(&line.text, &entry, mask))?;
                }
                Ok(None) => {
                    stats.missing += 1;
                    serde_json::to_writer(&mut out, &json!({ "ip": line.text, "found": false }))?;
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(input = %path.display(), line = line.number, ip = %addr, error = %e, "lookup failed");
                    serde_json::to_writer(&mut out, &json!({ "ip": line.text, "error": e.to_string() }))?;
                }
            }
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;

    if show_stats {
        let elapsed = started.elapsed();
        let cache = db.cache_stats();
        eprintln!();
        eprintln!("Batch statistics:");
        eprintln!("  Lines:          {}", format_number(stats.lines));
        eprintln!("  Found:          {}", format_number(stats.found));
        eprintln!("  Not found:      {}", format_number(stats.missing));
        eprintln!("  Invalid:        {}", format_number(stats.invalid));
        eprintln!("  Failed:         {}", format_number(stats.failed));
        eprintln!("  Time:           {:.3}s", elapsed.as_secs_f64());
        eprintln!(
            "  Throughput:     {} lookups/sec",
            format_rate(stats.lines as f64 / elapsed.as_secs_f64().max(1e-9))
        );
        eprintln!(
            "  String cache:   {:.1}% hit ({} cached)",
            cache.string_hit_rate() * 100.0,
            format_number(cache.strings_cached)
        );
        if cache.entry_hits + cache.entry_misses > 0 {
            eprintln!(
                "  Entry cache:    {:.1}% hit ({} cached)",
                cache.entry_hit_rate() * 100.0,
                format_number(cache.entries_cached)
            );
        }
    }
    Ok(())
}
