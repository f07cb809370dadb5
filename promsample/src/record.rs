//! The encoded sample record and zero-copy access to its fields.
//!
//! A [`SampleRecord`] owns one contiguous buffer laid out as described in
//! [`crate::layout`]. Every accessor reads straight out of that buffer; the
//! original text line is never consulted again.
//!
//! Records produced by the parser are valid by construction. Buffers coming
//! from elsewhere (storage, the network) go through
//! [`SampleRecord::from_bytes`], which checks every offset once so the
//! accessors can index without further checks.

use std::borrow::Cow;
use std::fmt;
use std::iter::FusedIterator;

use crate::clock::TimestampFormat;
use crate::error::{RecordError, Result};
use crate::layout::{
    HEADER_SIZE, LABEL_COUNT_OFFSET, LEN_PREFIX_SIZE, MIN_RECORD_SIZE, NAME_LEN_OFFSET,
    SIZE_OFFSET, TRAILER_SIZE,
};

#[inline]
pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    let mut raw = [0; 2];
    raw.copy_from_slice(&bytes[offset..offset + 2]);
    u16::from_le_bytes(raw)
}

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

#[inline]
fn read_8(bytes: &[u8], offset: usize) -> [u8; 8] {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    raw
}

/// Reads a length-prefixed field, returning it and the offset just past it.
#[inline]
fn read_prefixed(bytes: &[u8], offset: usize) -> (&[u8], usize) {
    let len = usize::from(read_u16(bytes, offset));
    let start = offset + LEN_PREFIX_SIZE;
    (&bytes[start..start + len], start + len)
}

/// One label of a record, borrowed from the record buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label<'a> {
    /// The label name.
    pub name: &'a [u8],
    /// The label value, exactly as it appeared between the quotes.
    pub value: &'a [u8],
}

impl<'a> Label<'a> {
    /// The label name as text, replacing invalid UTF-8.
    pub fn name_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.name)
    }

    /// The label value as text, replacing invalid UTF-8.
    pub fn value_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.value)
    }
}

/// Iterator over the labels of a record, in source order.
#[derive(Debug, Clone)]
pub struct Labels<'a> {
    bytes: &'a [u8],
    offset: usize,
    remaining: u16,
}

impl<'a> Iterator for Labels<'a> {
    type Item = Label<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let (name, offset) = read_prefixed(self.bytes, self.offset);
        let (value, offset) = read_prefixed(self.bytes, offset);
        self.offset = offset;
        self.remaining -= 1;

        Some(Label { name, value })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.remaining);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Labels<'_> {}

impl FusedIterator for Labels<'_> {}

/// An immutable, self-describing binary sample.
///
/// # Examples
///
/// ```rust
/// use promsample::SampleRecord;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let record = promsample::parse(r#"up{job="node"} 1 1700000000000"#)?;
///
/// // The raw bytes are the whole record and can be stored as-is.
/// let stored = record.as_bytes().to_vec();
/// let restored = SampleRecord::from_bytes(stored)?;
///
/// assert_eq!(restored.name(), b"up");
/// assert_eq!(restored.labels().next().map(|l| l.value), Some(&b"node"[..]));
/// assert_eq!(restored.value(), 1.0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, PartialEq)]
pub struct SampleRecord {
    bytes: Box<[u8]>,
}

impl SampleRecord {
    /// Wraps a buffer written by the record builder.
    pub(crate) fn from_built(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Validates `bytes` as an encoded record and takes ownership of it.
    ///
    /// # Errors
    ///
    /// - [`RecordError::Truncated`] if the buffer cannot hold a header and trailer
    /// - [`RecordError::SizeMismatch`] if the size field disagrees with the length
    /// - [`RecordError::Corrupted`] if the name or labels overrun their region
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::validate(&bytes)?;
        Ok(Self::from_built(bytes))
    }

    fn validate(bytes: &[u8]) -> Result<()> {
        let len = bytes.len();
        if len < MIN_RECORD_SIZE {
            return Err(RecordError::Truncated {
                len,
                min: MIN_RECORD_SIZE,
            }
            .into());
        }

        let stored = read_u32(bytes, SIZE_OFFSET) as usize;
        if stored != len {
            return Err(RecordError::SizeMismatch {
                stored,
                actual: len,
            }
            .into());
        }

        let name_len = usize::from(read_u16(bytes, NAME_LEN_OFFSET));
        let labels_start = HEADER_SIZE + name_len;
        let labels_end = len - TRAILER_SIZE;
        if labels_start > labels_end {
            return Err(RecordError::Corrupted {
                reason: format!("name of {name_len} bytes overruns the label area"),
            }
            .into());
        }

        let label_count = read_u16(bytes, LABEL_COUNT_OFFSET);
        let mut offset = labels_start;
        for index in 0..label_count {
            for field in ["name", "value"] {
                if offset + LEN_PREFIX_SIZE > labels_end {
                    return Err(RecordError::Corrupted {
                        reason: format!("label {index} {field} prefix overruns the label area"),
                    }
                    .into());
                }
                let field_len = usize::from(read_u16(bytes, offset));
                offset += LEN_PREFIX_SIZE;
                if offset + field_len > labels_end {
                    return Err(RecordError::Corrupted {
                        reason: format!("label {index} {field} overruns the label area"),
                    }
                    .into());
                }
                offset += field_len;
            }
        }

        if offset != labels_end {
            return Err(RecordError::Corrupted {
                reason: format!("{} unused bytes after the last label", labels_end - offset),
            }
            .into());
        }

        Ok(())
    }

    /// Total encoded length in bytes, as stored in the header.
    pub fn size(&self) -> usize {
        read_u32(&self.bytes, SIZE_OFFSET) as usize
    }

    /// Number of labels.
    pub fn label_count(&self) -> u16 {
        read_u16(&self.bytes, LABEL_COUNT_OFFSET)
    }

    /// The metric name.
    pub fn name(&self) -> &[u8] {
        let len = usize::from(read_u16(&self.bytes, NAME_LEN_OFFSET));
        &self.bytes[HEADER_SIZE..HEADER_SIZE + len]
    }

    /// The metric name as text, replacing invalid UTF-8.
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name())
    }

    /// The labels in source order.
    pub fn labels(&self) -> Labels<'_> {
        Labels {
            bytes: &self.bytes,
            offset: HEADER_SIZE + self.name().len(),
            remaining: self.label_count(),
        }
    }

    /// The sample value.
    pub fn value(&self) -> f64 {
        f64::from_le_bytes(read_8(&self.bytes, self.bytes.len() - TRAILER_SIZE))
    }

    /// The stored timestamp, in the representation chosen at parse time.
    pub fn timestamp(&self) -> i64 {
        i64::from_le_bytes(read_8(&self.bytes, self.bytes.len() - TRAILER_SIZE / 2))
    }

    /// The raw encoded record.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the record, returning the raw encoded buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_vec()
    }

    /// Renders the record as a single exposition line.
    ///
    /// `format` must be the timestamp format the record was parsed with; the
    /// timestamp is printed as Unix milliseconds.
    pub fn to_exposition(&self, format: TimestampFormat) -> String {
        let mut out = String::with_capacity(self.size() + 32);
        out.push_str(&self.name_lossy());

        if self.label_count() > 0 {
            out.push('{');
            for (i, label) in self.labels().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&label.name_lossy());
                out.push_str("=\"");
                out.push_str(&label.value_lossy());
                out.push('"');
            }
            out.push('}');
        }

        out.push_str(&format!(
            " {} {}",
            format_sample_value(self.value()),
            format.to_unix_millis(self.timestamp())
        ));
        out
    }
}

/// Formats a value the way the exposition format spells special floats.
fn format_sample_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

impl fmt::Debug for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<_> = self
            .labels()
            .map(|l| (l.name_lossy(), l.value_lossy()))
            .collect();
        f.debug_struct("SampleRecord")
            .field("size", &self.size())
            .field("name", &self.name_lossy())
            .field("labels", &labels)
            .field("value", &self.value())
            .field("timestamp", &self.timestamp())
            .finish()
    }
}

impl AsRef<[u8]> for SampleRecord {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl TryFrom<Vec<u8>> for SampleRecord {
    type Error = crate::error::PromSampleError;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes(bytes)
    }
}
