//! # promsample
//!
//! Parses single Prometheus exposition lines into compact binary records.
//!
//! A line such as `http_requests_total{method="post",code="200"} 1027 1395066363000`
//! becomes one self-describing byte buffer holding the metric name, the
//! labels in source order, the value and the timestamp. Fields are read back
//! straight from the buffer without re-parsing, and the buffer can be stored
//! or moved as opaque bytes.
//!
//! ## Key Properties
//!
//! - Exactly one allocation per line, sized by a measure pass before writing
//! - No padding: length-prefixed fields packed back to back
//! - Measure and write passes share one scanner, so they cannot disagree
//! - A rejected line never yields a partially written record
//!
//! ## Quick Start
//!
//! ```rust
//! use promsample::{SampleParser, ParserConfig};
//! use promsample::clock::FixedClock;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = SampleParser::new(ParserConfig::default())?
//!     .with_clock(FixedClock::new(1_700_000_000_000));
//!
//! let record = parser.parse(r#"http_requests_total{method="post",code="200"} 1027"#)?;
//!
//! assert_eq!(record.name(), b"http_requests_total");
//! for label in record.labels() {
//!     println!("{}={}", label.name_lossy(), label.value_lossy());
//! }
//! assert_eq!(record.value(), 1027.0);
//! assert_eq!(record.timestamp(), 1_700_000_000_000);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`scan`]: Metric name matching and the label scanner
//! - [`layout`]: Record format and the measure-pass layout planner
//! - [`builder`]: The write pass
//! - [`parser`]: Line driver tying the passes together
//! - [`record`]: The finished record and zero-copy field access
//! - [`clock`], [`allocator`]: Time and memory collaborators
//! - [`config`]: Parser configuration
//! - [`error`]: Error types

pub mod allocator;
pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod layout;
pub mod parser;
pub mod record;
pub mod scan;

// Re-export primary API types at crate root for convenience.
pub use clock::TimestampFormat;
pub use config::ParserConfig;
pub use error::{PromSampleError, Result};
pub use parser::SampleParser;
pub use record::{Label, SampleRecord};

/// Parses one exposition line with the default configuration and the system clock.
///
/// # Errors
///
/// See [`SampleParser::parse`].
pub fn parse(line: &str) -> Result<SampleRecord> {
    SampleParser::default().parse(line)
}
