mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ip2geo::Field;
use std::path::PathBuf;

use commands::{cmd_batch, cmd_dump, cmd_inspect, cmd_query};

#[derive(Parser)]
#[command(name = "ip2geo")]
#[command(
    about = "Query IP2Location-style BIN geolocation databases",
    long_about = "ip2geo - Read-only lookups against IP2Location-style BIN databases\n\n\
    Loads the IPv4 and IPv6 row blocks into memory, then answers range lookups\n\
    with a binary search. String fields are decoded on demand and cached.\n\n\
    Examples:\n\
      ip2geo query DB11.BIN 8.8.8.8 2001:4860:4860::8888\n\
      ip2geo query DB11.BIN 8.8.8.8 --fields country,city\n\
      ip2geo inspect DB11.BIN --json\n\
      ip2geo dump DB11.BIN --ip-version 6 --format ndjson\n\
      zcat ips.gz | ip2geo batch DB11.BIN - --stats"
)]
#[command(version)]
struct Cli {
    /// Enable log output on stderr (filter with RUST_LOG, default info)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one or more addresses and print the results as JSON
    Query {
        /// Path to the BIN database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Addresses to look up (IPv4, IPv6 or IPv4-mapped IPv6)
        #[arg(value_name = "IP", required = true)]
        addrs: Vec<String>,

        /// Only decode these fields (comma-separated, e.g. country,city)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<Field>,

        /// Print nothing; exit 0 if every address was found, 1 otherwise
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show database kind, build date, schema and row counts
    Inspect {
        /// Path to the BIN database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print every range of one IP version
    Dump {
        /// Path to the BIN database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// IP version to dump: 4 or 6
        #[arg(long, default_value = "4", value_parser = ["4", "6"])]
        ip_version: String,

        /// Only decode these fields (comma-separated)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<Field>,

        /// Output format
        #[arg(long, value_enum, default_value_t = DumpFormat::Csv)]
        format: DumpFormat,

        /// Stop after this many ranges
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Look up one address per line from files or stdin, printing NDJSON
    Batch {
        /// Path to the BIN database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Input files (plain or gzip), or "-" for stdin
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Only decode these fields (comma-separated)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<Field>,

        /// Bound the string cache to this many strings (0 disables it)
        #[arg(long)]
        cache_size: Option<usize>,

        /// Also cache fully decoded entries per row
        #[arg(long)]
        entry_cache: bool,

        /// Print lookup and cache statistics to stderr when done
        #[arg(short, long)]
        stats: bool,
    },
}

/// Output formats for `dump`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    /// Comma-separated values with a header row
    Csv,
    /// One JSON object per line
    Ndjson,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    } else {
        tracing_subscriber::EnvFilter::new("off")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Query {
            database,
            addrs,
            fields,
            quiet,
        } => cmd_query(database, addrs, fields, quiet),
        Commands::Inspect { database, json } => cmd_inspect(database, json),
        Commands::Dump {
            database,
            ip_version,
            fields,
            format,
            limit,
        } => cmd_dump(database, ip_version, fields, format, limit),
        Commands::Batch {
            database,
            inputs,
            fields,
            cache_size,
            entry_cache,
            stats,
        } => cmd_batch(database, inputs, fields, cache_size, entry_cache, stats),
    }
}
