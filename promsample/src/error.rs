//! Error types for the promsample exposition-line parser.
//!
//! Every validating function in the crate reports failure through the single
//! [`Result`] channel defined here. A failure is terminal for the parse that
//! raised it: no partial record is ever returned alongside an error.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all promsample operations.
///
/// Each variant corresponds to the stage of the parse that rejected the input.
#[derive(Error, Debug)]
pub enum PromSampleError {
    /// The metric name at the start of the line could not be matched.
    #[error("invalid input syntax for prometheus sample: {0}")]
    MalformedMetricName(#[from] MetricNameError),

    /// The `{...}` label set following the metric name is malformed.
    #[error("invalid input syntax for prometheus sample: {0}")]
    MalformedLabelSet(#[from] LabelSetError),

    /// The trailing sample value or timestamp is missing or unparseable.
    #[error("invalid input syntax for prometheus sample: {0}")]
    MalformedValue(#[from] ValueError),

    /// A record buffer is inconsistent with its own layout.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Parser configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while matching the metric name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricNameError {
    /// The line is empty, so there is no name to match.
    #[error("missing metric name")]
    Empty,

    /// The first byte is not one of `[A-Za-z_:]`.
    #[error("invalid first metric name char {}", DisplayByte(*found))]
    InvalidFirstChar {
        /// The offending byte.
        found: u8,
    },

    /// The name is longer than the configured maximum.
    #[error("metric name is {len} bytes long (max {max})")]
    TooLong {
        /// Length of the matched name.
        len: usize,
        /// The configured maximum.
        max: usize,
    },
}

/// Errors raised while scanning the `{...}` label set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelSetError {
    /// A label name starts with a byte outside `[A-Za-z_]`.
    #[error("invalid first label name char {} at offset {offset}", DisplayByte(*found))]
    InvalidFirstChar {
        /// The offending byte.
        found: u8,
        /// Offset of the byte within the label set.
        offset: usize,
    },

    /// A label name is not followed by `=`.
    #[error("expected '=' after label name at offset {offset}")]
    MissingEquals {
        /// Offset where `=` was expected.
        offset: usize,
    },

    /// A label value does not start with `"`.
    #[error("label not enclosed by double quotes (start) at offset {offset}")]
    MissingOpeningQuote {
        /// Offset where the opening quote was expected.
        offset: usize,
    },

    /// A label value hit `}` or the end of input before its closing `"`.
    #[error("label not enclosed by double quotes (end) at offset {offset}")]
    UnterminatedValue {
        /// Offset where the closing quote was expected.
        offset: usize,
    },

    /// A byte other than `,` or `}` follows a label, or the input ends early.
    #[error("unexpected end char {} at offset {offset}", DisplayEnd(*found))]
    UnexpectedChar {
        /// The offending byte, or `None` at end of input.
        found: Option<u8>,
        /// Offset of the offending position.
        offset: usize,
    },

    /// A label name is longer than the configured maximum.
    #[error("label name is {len} bytes long (max {max})")]
    NameTooLong {
        /// Length of the matched label name.
        len: usize,
        /// The configured maximum.
        max: usize,
    },

    /// A label value does not fit its 16-bit length prefix.
    #[error("label value is {len} bytes long (max {max})")]
    ValueTooLong {
        /// Length of the label value.
        len: usize,
        /// The largest encodable value length.
        max: usize,
    },

    /// More labels than the 16-bit label count can hold.
    #[error("too many labels (max {max})")]
    TooManyLabels {
        /// The largest encodable label count.
        max: usize,
    },
}

/// Errors raised while parsing the trailing value and timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Nothing follows the metric name and label set.
    #[error("missing sample value")]
    Missing,

    /// The value token is not a floating-point literal.
    #[error("invalid sample value '{token}'")]
    InvalidValue {
        /// The rejected token.
        token: String,
    },

    /// The timestamp token is not a 64-bit integer.
    #[error("invalid timestamp '{token}'")]
    InvalidTimestamp {
        /// The rejected token.
        token: String,
    },

    /// Something other than whitespace follows the timestamp.
    #[error("unexpected trailing input '{token}'")]
    TrailingInput {
        /// The first trailing token.
        token: String,
    },

    /// The timestamp cannot be represented after conversion.
    #[error("timestamp {millis}ms is out of range")]
    TimestampOutOfRange {
        /// The millisecond timestamp that overflowed.
        millis: i64,
    },
}

/// Errors raised by the record layout, builder, or reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The planned record does not fit the 32-bit size field.
    #[error("record of {size} bytes exceeds the maximum encodable size")]
    TooLarge {
        /// The planned size.
        size: usize,
    },

    /// The allocator returned a buffer of the wrong length.
    #[error("allocator returned {actual} bytes, expected {expected}")]
    AllocationSize {
        /// The planned size.
        expected: usize,
        /// The length actually returned.
        actual: usize,
    },

    /// The write pass did not fill the buffer exactly as planned.
    #[error("layout mismatch: planned {planned} bytes, write pass produced {written}")]
    LayoutMismatch {
        /// Byte count computed by the measure pass.
        planned: usize,
        /// Byte count produced by the write pass.
        written: usize,
    },

    /// A buffer is shorter than the fixed header and trailer.
    #[error("buffer of {len} bytes is too short for a record (min {min})")]
    Truncated {
        /// The buffer length.
        len: usize,
        /// The smallest possible record.
        min: usize,
    },

    /// The stored size field disagrees with the buffer length.
    #[error("record size field is {stored} but buffer holds {actual} bytes")]
    SizeMismatch {
        /// The size stored in the header.
        stored: usize,
        /// The buffer length.
        actual: usize,
    },

    /// The name or label area runs past its region.
    #[error("corrupted record: {reason}")]
    Corrupted {
        /// Description of the inconsistency.
        reason: String,
    },
}

/// Errors that can occur when loading or validating parser configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to load config from '{}': {source}", path.display())]
    Load {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration JSON.
    #[error("failed to parse config: {source}")]
    Parse {
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// The maximum name length is zero or exceeds the 16-bit length prefix.
    #[error("invalid max_name_len {value}: must be between 1 and {max}")]
    InvalidMaxNameLen {
        /// The configured value.
        value: usize,
        /// The largest supported value.
        max: usize,
    },
}

/// Type alias for `Result<T, PromSampleError>`.
pub type Result<T> = std::result::Result<T, PromSampleError>;

/// Renders a byte for error messages: printable ASCII as-is, otherwise hex.
struct DisplayByte(u8);

impl std::fmt::Display for DisplayByte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_ascii_graphic() {
            write!(f, "'{}'", char::from(self.0))
        } else {
            write!(f, "0x{:02x}", self.0)
        }
    }
}

struct DisplayEnd(Option<u8>);

impl std::fmt::Display for DisplayEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(byte) => DisplayByte(byte).fmt(f),
            None => f.write_str("<end of input>"),
        }
    }
}
