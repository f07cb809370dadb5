//! Byte-level scanning of metric names and `{name="value",...}` label sets.
//!
//! The label scanner runs twice per line. The measure pass feeds accepted
//! labels to a [`ParseContext`], which only counts them. The write pass feeds
//! the same labels to a writer that encodes them into the record buffer.
//! Both passes go through [`LabelScanner::scan`], so they validate the input
//! identically and can never disagree on its structure.
//!
//! Nothing in this module allocates. Names and values are handed to the sink
//! as sub-slices of the input.

use crate::error::{LabelSetError, MetricNameError, Result};
use crate::layout::encoded_label_len;

/// Largest label name or value representable by its 16-bit length prefix.
pub const MAX_VALUE_LEN: usize = u16::MAX as usize;

/// Largest label count representable by the 16-bit header field.
pub const MAX_LABEL_COUNT: usize = u16::MAX as usize;

/// Receives each label accepted by [`LabelScanner::scan`], in source order.
pub trait LabelSink {
    /// Accepts one label.
    ///
    /// # Errors
    ///
    /// Implementations reject labels that cannot be recorded; the error
    /// aborts the scan.
    fn accept(&mut self, name: &[u8], value: &[u8]) -> Result<()>;
}

/// Running counters of the measure pass.
///
/// After a successful scan, [`label_bytes`](Self::label_bytes) is exactly
/// the size of the encoded label area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseContext {
    label_count: usize,
    label_bytes: usize,
}

impl ParseContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of labels seen so far.
    pub fn label_count(&self) -> usize {
        self.label_count
    }

    /// Encoded size of the labels seen so far.
    pub fn label_bytes(&self) -> usize {
        self.label_bytes
    }
}

impl LabelSink for ParseContext {
    fn accept(&mut self, name: &[u8], value: &[u8]) -> Result<()> {
        if self.label_count >= MAX_LABEL_COUNT {
            return Err(LabelSetError::TooManyLabels {
                max: MAX_LABEL_COUNT,
            }
            .into());
        }
        if name.len() > MAX_VALUE_LEN {
            return Err(LabelSetError::NameTooLong {
                len: name.len(),
                max: MAX_VALUE_LEN,
            }
            .into());
        }
        self.label_count += 1;
        self.label_bytes += encoded_label_len(name.len(), value.len());
        Ok(())
    }
}

#[inline]
fn is_metric_name_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b':'
}

#[inline]
fn is_metric_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b':'
}

#[inline]
fn is_label_name_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

#[inline]
fn is_label_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Matches the metric name at the start of `input`.
///
/// The name ends at the first byte outside `[A-Za-z0-9_:]`; whatever follows
/// (a label set, whitespace, the value) is left for the caller.
///
/// # Errors
///
/// - [`MetricNameError::Empty`] if `input` is empty
/// - [`MetricNameError::InvalidFirstChar`] if the first byte is not `[A-Za-z_:]`
/// - [`MetricNameError::TooLong`] if the name exceeds `max_len`
pub fn scan_metric_name(input: &[u8], max_len: usize) -> Result<&[u8]> {
    let Some(&first) = input.first() else {
        return Err(MetricNameError::Empty.into());
    };

    if !is_metric_name_start(first) {
        return Err(MetricNameError::InvalidFirstChar { found: first }.into());
    }

    let len = 1 + input[1..]
        .iter()
        .take_while(|&&byte| is_metric_name_char(byte))
        .count();

    if len > max_len {
        return Err(MetricNameError::TooLong { len, max: max_len }.into());
    }

    Ok(&input[..len])
}

/// Scanner for the optional label set following a metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelScanner {
    max_name_len: usize,
}

impl LabelScanner {
    /// Creates a scanner rejecting label names longer than `max_name_len`.
    pub fn new(max_name_len: usize) -> Self {
        Self { max_name_len }
    }

    /// Scans the label set at the start of `input`, passing each label to `sink`.
    ///
    /// If `input` does not start with `{` there is no label set: nothing is
    /// consumed and `Ok(0)` is returned. Otherwise the returned count covers
    /// everything through the closing `}`.
    ///
    /// A label value runs from its opening `"` to the first `"` or `}`. There
    /// is no escape handling, so a value can contain neither byte.
    ///
    /// # Errors
    ///
    /// Returns a [`LabelSetError`] describing the first violation, or any
    /// error raised by `sink`.
    pub fn scan<S: LabelSink>(&self, input: &[u8], sink: &mut S) -> Result<usize> {
        if input.first() != Some(&b'{') {
            return Ok(0);
        }

        // Skip opening brace
        let mut i = 1;

        while let Some(&first) = input.get(i) {
            if first == b'}' {
                break;
            }

            if !is_label_name_start(first) {
                return Err(LabelSetError::InvalidFirstChar {
                    found: first,
                    offset: i,
                }
                .into());
            }

            let name_start = i;
            i += 1;
            while input.get(i).is_some_and(|&byte| is_label_name_char(byte)) {
                i += 1;
            }
            let name = &input[name_start..i];

            if name.len() > self.max_name_len {
                return Err(LabelSetError::NameTooLong {
                    len: name.len(),
                    max: self.max_name_len,
                }
                .into());
            }

            if input.get(i) != Some(&b'=') {
                return Err(LabelSetError::MissingEquals { offset: i }.into());
            }
            i += 1;

            if input.get(i) != Some(&b'"') {
                return Err(LabelSetError::MissingOpeningQuote { offset: i }.into());
            }
            i += 1;

            let value_start = i;
            while input
                .get(i)
                .is_some_and(|&byte| byte != b'"' && byte != b'}')
            {
                i += 1;
            }

            if input.get(i) != Some(&b'"') {
                return Err(LabelSetError::UnterminatedValue { offset: i }.into());
            }
            let value = &input[value_start..i];

            if value.len() > MAX_VALUE_LEN {
                return Err(LabelSetError::ValueTooLong {
                    len: value.len(),
                    max: MAX_VALUE_LEN,
                }
                .into());
            }

            sink.accept(name, value)?;

            // Skip closing quote
            i += 1;

            if input.get(i) == Some(&b',') {
                i += 1;
            } else {
                break;
            }
        }

        match input.get(i) {
            Some(b'}') => Ok(i + 1),
            found => Err(LabelSetError::UnexpectedChar {
                found: found.copied(),
                offset: i,
            }
            .into()),
        }
    }
}
