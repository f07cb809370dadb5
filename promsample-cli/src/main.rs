//! CLI for the promsample exposition-line parser.
//!
//! Parses one line given on the command line and dumps the resulting record,
//! either as a human-readable listing with a hex dump or as JSON.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use promsample::{ParserConfig, SampleParser, SampleRecord, TimestampFormat};
use tracing_subscriber::EnvFilter;

/// promsample: parse a Prometheus exposition line into a binary sample record.
#[derive(Parser)]
#[command(name = "promsample", version, about)]
struct Cli {
    /// The exposition line, e.g. `up{job="node"} 1 1700000000000`.
    line: String,

    /// Output format.
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Timestamp representation stored in the record. Overrides the config file.
    #[arg(long)]
    timestamp_format: Option<TimestampArg>,

    /// Path to a JSON parser configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Output format for the parsed record.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Field listing followed by a hex dump.
    Text,
    /// A single JSON object.
    Json,
}

/// Timestamp representation selectable on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum TimestampArg {
    /// Milliseconds since the Unix epoch.
    UnixMillis,
    /// Microseconds since 2000-01-01, as PostgreSQL stores them.
    Postgres,
}

impl From<TimestampArg> for TimestampFormat {
    fn from(arg: TimestampArg) -> Self {
        match arg {
            TimestampArg::UnixMillis => Self::UnixMillis,
            TimestampArg::Postgres => Self::Postgres,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ParserConfig::load(path)?,
        None => ParserConfig::default(),
    };
    if let Some(format) = cli.timestamp_format {
        config.timestamp_format = format.into();
    }
    tracing::debug!(?config, "parser configured");

    let format = config.timestamp_format;
    let parser = SampleParser::new(config)?;
    let record = parser.parse(&cli.line)?;

    match cli.format {
        OutputFormat::Text => print!("{}", render_text(&record, format)),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&render_json(&record, format))?);
        }
    }

    Ok(())
}

fn timestamp_format_name(format: TimestampFormat) -> &'static str {
    match format {
        TimestampFormat::UnixMillis => "unix-millis",
        TimestampFormat::Postgres => "postgres",
    }
}

/// Renders the record fields followed by a hex dump of its bytes.
fn render_text(record: &SampleRecord, format: TimestampFormat) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "size:        {} bytes", record.size());
    let _ = writeln!(out, "name:        {}", record.name_lossy());
    let _ = writeln!(out, "labels:      {}", record.label_count());
    for label in record.labels() {
        let _ = writeln!(out, "  {} = \"{}\"", label.name_lossy(), label.value_lossy());
    }
    let _ = writeln!(out, "value:       {}", record.value());
    let _ = writeln!(
        out,
        "timestamp:   {} ({})",
        record.timestamp(),
        timestamp_format_name(format)
    );
    out.push('\n');
    out.push_str(&hex_dump(record.as_bytes()));
    out
}

/// Renders the record as a JSON object.
fn render_json(record: &SampleRecord, format: TimestampFormat) -> serde_json::Value {
    let labels: Vec<_> = record
        .labels()
        .map(|l| serde_json::json!({ "name": l.name_lossy(), "value": l.value_lossy() }))
        .collect();

    // NaN and infinities serialize as null; the exposition field keeps them.
    serde_json::json!({
        "size": record.size(),
        "name": record.name_lossy(),
        "labels": labels,
        "value": record.value(),
        "timestamp": record.timestamp(),
        "timestamp_format": timestamp_format_name(format),
        "exposition": record.to_exposition(format),
    })
}

/// Formats bytes 16 per row in two groups of 8, with an ASCII column.
fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();

    for (row, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:08x} ", row * 16);
        for i in 0..16 {
            if i == 8 {
                out.push(' ');
            }
            match chunk.get(i) {
                Some(byte) => {
                    let _ = write!(out, " {byte:02x}");
                }
                None => out.push_str("   "),
            }
        }

        out.push_str("  |");
        for &byte in chunk {
            out.push(if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte)
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }

    out
}
