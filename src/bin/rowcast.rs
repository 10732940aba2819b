//! rowcast: Fold row streams into nested JSON documents
//!
//! Input is line-delimited JSON: a header line with the column names, then
//! one JSON array of cell values per row.
//!
//! Usage:
//!   # Read from file, write Elasticsearch bulk lines to stdout
//!   rowcast rows.jsonl
//!
//!   # Read from stdin, one document per line
//!   cat rows.jsonl | rowcast --sink ndjson
//!
//!   # Track content changes between runs
//!   rowcast rows.jsonl --digest sha256 --previous-digest "$(cat last.digest)" --run-version 42

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use rowcast::cast::DigestAlgorithm;
use rowcast::{fetch, CastConfig, JsonRowSource, RowListener, SinkRegistry};
use std::fs::File;
use std::io::{stdin, stdout, BufRead, BufReader, BufWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "rowcast")]
#[command(about = "Fold row streams into nested JSON documents", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Output format: "bulk" (Elasticsearch bulk) or "ndjson"
    #[arg(long, default_value = "bulk")]
    sink: String,

    /// Skip null cells instead of writing null fields
    #[arg(long)]
    ignore_null: bool,

    /// Don't parse text cells that hold JSON objects
    #[arg(long)]
    no_detect_json: bool,

    /// Compute a content digest over all documents (sha256 or sha512)
    #[arg(long)]
    digest: Option<DigestAlgorithm>,

    /// Digest printed by the previous run, to detect changed content
    #[arg(long, requires = "digest")]
    previous_digest: Option<String>,

    /// Version marker of this run, stamped on documents without `_version`
    #[arg(long)]
    run_version: Option<i64>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    // Build config
    let config = CastConfig {
        ignore_null: args.ignore_null,
        detect_json: !args.no_detect_json,
        digest: args.digest,
        version: args.run_version,
    };

    let reader: Box<dyn BufRead> = if let Some(file_path) = &args.input {
        let file = File::open(file_path).with_context(|| format!("Failed to open input: {}", file_path))?;
        Box::new(BufReader::new(file))
    } else {
        Box::new(BufReader::new(stdin()))
    };

    let registry = SinkRegistry::default();
    let sink = registry
        .create(&args.sink, Box::new(BufWriter::new(stdout())))
        .with_context(|| {
            let known: Vec<&str> = registry.names().collect();
            format!("Unknown sink, expected one of: {}", known.join(", "))
        })?;

    let mut source = JsonRowSource::new(reader).context("Failed to read column header")?;
    let mut listener = RowListener::new(sink, config);
    let outcome = fetch(&mut source, &mut listener, args.previous_digest.as_deref())
        .context("Failed to cast rows")?;

    if let Some(digest) = &outcome.digest {
        eprintln!("digest: {}", digest);
        if outcome.changed(args.previous_digest.as_deref()) == Some(true) {
            eprintln!("content changed since previous run");
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays a clean document stream
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rowcast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
