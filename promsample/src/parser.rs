//! Line parsing: from one exposition line to one [`SampleRecord`].
//!
//! # Parse Flow
//!
//! 1. Match the metric name
//! 2. Measure the label set and plan the record layout
//! 3. Parse the trailing value and optional timestamp
//! 4. Allocate one buffer of exactly the planned size
//! 5. Write the header, name and labels into it
//! 6. Assign the value and timestamp
//!
//! Any failure aborts the whole parse. Because the trailing fields are
//! checked before step 4, a rejected line never allocates a record buffer.

use crate::allocator::{HeapAllocator, RecordAllocator};
use crate::builder::RecordBuilder;
use crate::clock::{Clock, SystemClock};
use crate::config::ParserConfig;
use crate::error::{Result, ValueError};
use crate::layout::RecordLayout;
use crate::record::SampleRecord;
use crate::scan::{LabelScanner, scan_metric_name};

/// Parser for single exposition lines.
///
/// A parser holds no per-line state; one instance can be shared by any
/// number of callers.
///
/// # Examples
///
/// ```rust
/// use promsample::{ParserConfig, SampleParser};
/// use promsample::clock::FixedClock;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let parser = SampleParser::new(ParserConfig::default())?
///     .with_clock(FixedClock::new(1_700_000_000_000));
///
/// let record = parser.parse("metric_without_labels 42")?;
/// assert_eq!(record.name(), b"metric_without_labels");
/// assert_eq!(record.label_count(), 0);
/// assert_eq!(record.value(), 42.0);
/// assert_eq!(record.timestamp(), 1_700_000_000_000);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SampleParser<C = SystemClock, A = HeapAllocator> {
    config: ParserConfig,
    scanner: LabelScanner,
    clock: C,
    allocator: A,
}

impl SampleParser {
    /// Creates a parser using the system clock and the heap allocator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if `config` is invalid.
    pub fn new(config: ParserConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scanner: LabelScanner::new(config.max_name_len),
            config,
            clock: SystemClock,
            allocator: HeapAllocator,
        })
    }
}

impl Default for SampleParser {
    fn default() -> Self {
        let config = ParserConfig::default();
        Self {
            scanner: LabelScanner::new(config.max_name_len),
            config,
            clock: SystemClock,
            allocator: HeapAllocator,
        }
    }
}

impl<C: Clock, A: RecordAllocator> SampleParser<C, A> {
    /// Replaces the clock used for lines without a timestamp.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> SampleParser<C2, A> {
        SampleParser {
            config: self.config,
            scanner: self.scanner,
            clock,
            allocator: self.allocator,
        }
    }

    /// Replaces the allocator that provides record buffers.
    pub fn with_allocator<A2: RecordAllocator>(self, allocator: A2) -> SampleParser<C, A2> {
        SampleParser {
            config: self.config,
            scanner: self.scanner,
            clock: self.clock,
            allocator,
        }
    }

    /// Returns the parser configuration.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses one exposition line.
    ///
    /// # Errors
    ///
    /// - [`PromSampleError::MalformedMetricName`](crate::PromSampleError::MalformedMetricName)
    ///   if the line does not start with a valid metric name
    /// - [`PromSampleError::MalformedLabelSet`](crate::PromSampleError::MalformedLabelSet)
    ///   if the label set is malformed
    /// - [`PromSampleError::MalformedValue`](crate::PromSampleError::MalformedValue)
    ///   if the value is missing or the value or timestamp is unparseable
    pub fn parse(&self, line: &str) -> Result<SampleRecord> {
        self.parse_bytes(line.as_bytes())
    }

    /// Parses one exposition line given as raw bytes.
    ///
    /// Label values are copied byte for byte and need not be UTF-8.
    ///
    /// # Errors
    ///
    /// Same as [`SampleParser::parse`].
    pub fn parse_bytes(&self, line: &[u8]) -> Result<SampleRecord> {
        let result = self.parse_line(line);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "rejected exposition line");
        }
        result
    }

    fn parse_line(&self, line: &[u8]) -> Result<SampleRecord> {
        let name = scan_metric_name(line, self.config.max_name_len)?;
        let rest = &line[name.len()..];

        // Measure pass
        let layout = RecordLayout::plan(name.len(), rest, &self.scanner)?;

        let (value, explicit_ms) = parse_value_and_timestamp(&rest[layout.label_set_len()..])?;
        let millis = match explicit_ms {
            Some(ms) => ms,
            None => {
                let now = self.clock.now_ms();
                tracing::trace!(now, "no timestamp in line, sampled clock");
                now
            }
        };
        let timestamp = self
            .config
            .timestamp_format
            .internal_from_millis(millis)
            .ok_or(ValueError::TimestampOutOfRange { millis })?;

        let buf = self.allocator.allocate(layout.size());

        // Write pass
        let pending = RecordBuilder::new(layout, self.scanner).build(buf, name, rest)?;

        Ok(pending.finish(value, timestamp))
    }
}

/// Parses `WS* value (WS+ timestamp)? WS*`.
fn parse_value_and_timestamp(input: &[u8]) -> Result<(f64, Option<i64>)> {
    let mut tokens = input
        .split(|byte| byte.is_ascii_whitespace())
        .filter(|token| !token.is_empty());

    let value_token = tokens.next().ok_or(ValueError::Missing)?;
    let value = std::str::from_utf8(value_token)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| ValueError::InvalidValue {
            token: String::from_utf8_lossy(value_token).into_owned(),
        })?;

    let timestamp = match tokens.next() {
        Some(token) => Some(
            std::str::from_utf8(token)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| ValueError::InvalidTimestamp {
                    token: String::from_utf8_lossy(token).into_owned(),
                })?,
        ),
        None => None,
    };

    if let Some(extra) = tokens.next() {
        return Err(ValueError::TrailingInput {
            token: String::from_utf8_lossy(extra).into_owned(),
        }
        .into());
    }

    Ok((value, timestamp))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::clock::{FixedClock, TimestampFormat};
    use crate::error::{LabelSetError, MetricNameError, PromSampleError};

    const NOW: i64 = 1_700_000_000_123;

    #[derive(Default)]
    struct CountingAllocator {
        calls: Cell<usize>,
        last_size: Cell<usize>,
    }

    impl RecordAllocator for CountingAllocator {
        fn allocate(&self, size: usize) -> Vec<u8> {
            self.calls.set(self.calls.get() + 1);
            self.last_size.set(size);
            vec![0; size]
        }
    }

    fn parser() -> SampleParser<FixedClock> {
        SampleParser::default().with_clock(FixedClock::new(NOW))
    }

    fn labels(record: &SampleRecord) -> Vec<(String, String)> {
        record
            .labels()
            .map(|l| (l.name_lossy().into_owned(), l.value_lossy().into_owned()))
            .collect()
    }

    #[test]
    fn test_full_line() {
        let record = parser()
            .parse(r#"http_requests_total{method="post",code="200"} 1027 1395066363000"#)
            .unwrap();

        assert_eq!(record.name(), b"http_requests_total");
        assert_eq!(
            labels(&record),
            vec![
                ("method".to_string(), "post".to_string()),
                ("code".to_string(), "200".to_string()),
            ]
        );
        assert_eq!(record.value(), 1027.0);
        assert_eq!(record.timestamp(), 1_395_066_363_000);
    }

    #[test]
    fn test_missing_timestamp_uses_clock() {
        let record = parser().parse("metric_without_labels 42").unwrap();
        assert_eq!(record.name(), b"metric_without_labels");
        assert_eq!(record.label_count(), 0);
        assert_eq!(record.value(), 42.0);
        assert_eq!(record.timestamp(), NOW);
    }

    #[test]
    fn test_empty_braces_equal_no_braces() {
        let with = parser().parse("metric{} 1 5").unwrap();
        let without = parser().parse("metric 1 5").unwrap();
        assert_eq!(with.label_count(), 0);
        assert_eq!(with, without);
    }

    #[test]
    fn test_negative_timestamp() {
        let record = parser().parse(r#"m{a="x"} 3.14 -5"#).unwrap();
        assert_eq!(record.value(), 3.14);
        assert_eq!(record.timestamp(), -5);
    }

    #[test]
    fn test_special_values() {
        assert!(parser().parse("m NaN").unwrap().value().is_nan());
        assert_eq!(parser().parse("m +Inf").unwrap().value(), f64::INFINITY);
        assert_eq!(parser().parse("m -Inf").unwrap().value(), f64::NEG_INFINITY);
        assert_eq!(parser().parse("m 1.5e3").unwrap().value(), 1500.0);
    }

    #[test]
    fn test_whitespace_tolerance() {
        let record = parser().parse("m{a=\"x\"}\t 7  9\r\n").unwrap();
        assert_eq!(record.value(), 7.0);
        assert_eq!(record.timestamp(), 9);

        // No separator is needed after a label set.
        let record = parser().parse(r#"m{a="x"}7"#).unwrap();
        assert_eq!(record.value(), 7.0);
    }

    #[test]
    fn test_value_errors() {
        let cases: [(&str, ValueError); 5] = [
            ("m", ValueError::Missing),
            (r#"m{a="x"}   "#, ValueError::Missing),
            ("m abc", ValueError::InvalidValue { token: "abc".to_string() }),
            ("m 1 12.5", ValueError::InvalidTimestamp { token: "12.5".to_string() }),
            ("m 1 2 3", ValueError::TrailingInput { token: "3".to_string() }),
        ];

        for (line, expected) in cases {
            match parser().parse(line) {
                Err(PromSampleError::MalformedValue(e)) => assert_eq!(e, expected, "line {line:?}"),
                other => panic!("expected value error for {line:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_label_set_errors() {
        assert!(matches!(
            parser().parse(r#"bad{1abc="x"} 1"#),
            Err(PromSampleError::MalformedLabelSet(
                LabelSetError::InvalidFirstChar { found: b'1', .. }
            ))
        ));
        assert!(matches!(
            parser().parse(r#"m{a="x""#),
            Err(PromSampleError::MalformedLabelSet(_))
        ));
        assert!(matches!(
            parser().parse(r#"m{a="x}y"} 1"#),
            Err(PromSampleError::MalformedLabelSet(
                LabelSetError::UnterminatedValue { .. }
            ))
        ));
    }

    #[test]
    fn test_metric_name_errors() {
        assert!(matches!(
            parser().parse(""),
            Err(PromSampleError::MalformedMetricName(MetricNameError::Empty))
        ));
        assert!(matches!(
            parser().parse(" m 1"),
            Err(PromSampleError::MalformedMetricName(
                MetricNameError::InvalidFirstChar { found: b' ' }
            ))
        ));
    }

    #[test]
    fn test_long_names_are_rejected_not_truncated() {
        let config = ParserConfig {
            max_name_len: 4,
            ..ParserConfig::default()
        };
        let parser = SampleParser::new(config).unwrap();

        assert!(parser.parse("abcd 1").is_ok());
        assert!(matches!(
            parser.parse("abcde 1"),
            Err(PromSampleError::MalformedMetricName(MetricNameError::TooLong { .. }))
        ));
        assert!(matches!(
            parser.parse(r#"m{abcde="x"} 1"#),
            Err(PromSampleError::MalformedLabelSet(LabelSetError::NameTooLong { .. }))
        ));
    }

    #[test]
    fn test_one_exact_allocation() {
        let allocator = CountingAllocator::default();
        let parser = parser().with_allocator(&allocator);

        let record = parser.parse(r#"up{job="node",instance="a:9100"} 1"#).unwrap();
        assert_eq!(allocator.calls.get(), 1);
        assert_eq!(allocator.last_size.get(), record.size());
        assert_eq!(record.as_bytes().len(), record.size());
    }

    #[test]
    fn test_failed_parse_does_not_allocate() {
        let allocator = CountingAllocator::default();
        let parser = parser().with_allocator(&allocator);

        for line in [r#"bad{1abc="x"} 1"#, r#"m{a="x"}"#, "m 1 x", "9m 1"] {
            assert!(parser.parse(line).is_err());
        }
        assert_eq!(allocator.calls.get(), 0);
    }

    #[test]
    fn test_postgres_timestamps() {
        let config = ParserConfig {
            timestamp_format: TimestampFormat::Postgres,
            ..ParserConfig::default()
        };
        let parser = SampleParser::new(config)
            .unwrap()
            .with_clock(FixedClock::new(946_684_800_000));

        let record = parser.parse("m 1 946684800001").unwrap();
        assert_eq!(record.timestamp(), 1000);

        let record = parser.parse("m 1").unwrap();
        assert_eq!(record.timestamp(), 0);

        assert!(matches!(
            parser.parse("m 1 9223372036854775807"),
            Err(PromSampleError::MalformedValue(
                ValueError::TimestampOutOfRange { .. }
            ))
        ));
    }

    #[test]
    fn test_non_utf8_label_value() {
        let record = parser().parse_bytes(b"m{a=\"\xff\xfe\"} 1 2").unwrap();
        let label = record.labels().next().unwrap();
        assert_eq!(label.value, b"\xff\xfe");
    }

    #[test]
    fn test_invalid_config() {
        let config = ParserConfig {
            max_name_len: 0,
            ..ParserConfig::default()
        };
        assert!(matches!(
            SampleParser::new(config),
            Err(PromSampleError::Config(_))
        ));
    }

    #[test]
    fn test_label_count_limit() {
        let line = |count: usize| format!("m{{{}}} 1 2", vec![r#"a="""#; count].join(","));

        let record = parser().parse(&line(65_535)).unwrap();
        assert_eq!(record.label_count(), 65_535);
        assert_eq!(record.labels().len(), 65_535);
        assert_eq!(record.timestamp(), 2);

        assert!(matches!(
            parser().parse(&line(65_536)),
            Err(PromSampleError::MalformedLabelSet(LabelSetError::TooManyLabels {
                max: 65_535
            }))
        ));
    }
}
