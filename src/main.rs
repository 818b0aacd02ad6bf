//! # TLM Decode
//!
//! Decode a Spektrum TLM telemetry log and write it as JSON Lines.
//!
//! # Examples
//!
//! ```bash
//! # Assembled rows to stdout
//! tlm-decode flight.TLM
//!
//! # Rows plus headers and raw records to a file
//! tlm-decode flight.TLM --headers --records -o flight.jsonl
//!
//! # Custom frame layout
//! tlm-decode flight.TLM -c config/default.toml
//! ```
//!
//! Expected log output:
//! ```text
//! INFO spektrum_tlm::tlm::parser: Session 1 at offset 0: Fixed Wing 'Trainer' (DSMX 22ms)
//! INFO spektrum_tlm::tlm::parser: Parsed 1 sessions, 5210 data records, 0 warnings
//! INFO tlm_decode: Wrote 1873 lines
//! ```

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use spektrum_tlm::config::Config;
use spektrum_tlm::export::JsonlWriter;
use spektrum_tlm::{assemble, CodecRegistry, TlmParser};

/// Decode Spektrum TLM telemetry logs
#[derive(Parser, Debug)]
#[command(name = "tlm-decode")]
#[command(version)]
#[command(about = "Decode Spektrum TLM telemetry logs into JSON Lines", long_about = None)]
struct Args {
    /// TLM file to decode
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Output file (stdout when omitted)
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,

    /// Also write the per-sensor data records
    #[arg(long)]
    records: bool,

    /// Also write main and supplemental headers
    #[arg(long)]
    headers: bool,
}

fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for records
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    run(&args)
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let bytes = fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    info!("Decoding {} ({} bytes)", args.input.display(), bytes.len());

    let registry = CodecRegistry::spektrum();
    let log = TlmParser::from_config(&config, &registry)
        .parse(&bytes)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;

    if !log.warnings.is_empty() {
        warn!("{} warnings while decoding", log.warnings.len());
    }

    let rows = assemble(&log.data_records);

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut writer = JsonlWriter::new(sink);
    writer.write_log(
        &log,
        &rows,
        args.headers || config.output.include_headers,
        args.records || config.output.include_records,
    )?;
    writer.flush()?;

    info!("Wrote {} lines", writer.lines());
    Ok(())
}
