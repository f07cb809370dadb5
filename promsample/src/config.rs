//! Parser configuration.
//!
//! Configuration is a small serde struct so it can be embedded in a host's
//! own config file or loaded standalone from JSON.
//!
//! ```json
//! { "max_name_len": 1023, "timestamp_format": "postgres" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clock::TimestampFormat;
use crate::error::{ConfigError, Result};

/// Default cap on metric and label name length, in bytes.
pub const DEFAULT_MAX_NAME_LEN: usize = 1023;

/// Configuration for a [`SampleParser`](crate::parser::SampleParser).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Longest accepted metric or label name. Longer names are rejected,
    /// never truncated. Must fit the 16-bit name length prefix.
    pub max_name_len: usize,

    /// Representation of the timestamp stored in each record.
    pub timestamp_format: TimestampFormat,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
            timestamp_format: TimestampFormat::default(),
        }
    }
}

impl ParserConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxNameLen`] if `max_name_len` is zero
    /// or larger than `u16::MAX`.
    pub fn validate(&self) -> Result<()> {
        let max = usize::from(u16::MAX);
        if self.max_name_len == 0 || self.max_name_len > max {
            return Err(ConfigError::InvalidMaxNameLen {
                value: self.max_name_len,
                max,
            }
            .into());
        }
        Ok(())
    }

    /// Parses and validates a configuration from a JSON string.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidMaxNameLen`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse { source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read, otherwise
    /// the errors of [`ParserConfig::from_json_str`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&data)
    }
}
