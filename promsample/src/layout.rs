//! Record layout planning.
//!
//! A record is one contiguous buffer that is never resized, so its size must
//! be known exactly before it is allocated. [`RecordLayout::plan`] runs the
//! label scanner in measure mode and combines the result with the metric
//! name length.
//!
//! # Record Format
//!
//! All integers are little-endian.
//!
//! ```text
//! [0..4)              size         u32, total record length
//! [4..6)              label_count  u16
//! [6..8)              name_len     u16
//! [8..8+N)            metric name
//! [8+N..size-16)      labels       { u16 len, name, u16 len, value } * label_count
//! [size-16..size-8)   value        f64
//! [size-8..size)      timestamp    i64
//! ```

use crate::error::{MetricNameError, RecordError, Result};
use crate::scan::{LabelScanner, MAX_LABEL_COUNT, ParseContext};

/// Offset of the `size` header field.
pub(crate) const SIZE_OFFSET: usize = 0;

/// Offset of the `label_count` header field.
pub(crate) const LABEL_COUNT_OFFSET: usize = 4;

/// Offset of the `name_len` header field.
pub(crate) const NAME_LEN_OFFSET: usize = 6;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Size of each name or value length prefix in bytes.
pub const LEN_PREFIX_SIZE: usize = 2;

/// Per-label overhead: one length prefix for the name, one for the value.
pub const LABEL_OVERHEAD: usize = 2 * LEN_PREFIX_SIZE;

/// Size of the fixed trailer (`f64` value and `i64` timestamp) in bytes.
pub const TRAILER_SIZE: usize = 16;

/// Size of the smallest possible record.
pub const MIN_RECORD_SIZE: usize = HEADER_SIZE + TRAILER_SIZE;

/// Number of bytes one label occupies in the label area.
#[inline]
pub const fn encoded_label_len(name_len: usize, value_len: usize) -> usize {
    name_len + value_len + LABEL_OVERHEAD
}

/// Exact sizes and offsets of a record, computed before it is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    name_len: usize,
    label_count: u16,
    label_bytes: usize,
    label_set_len: usize,
    size: usize,
}

impl RecordLayout {
    /// Runs the measure pass over `label_input` and computes the layout.
    ///
    /// `label_input` is the line remainder right after the metric name. The
    /// write pass must be given the identical slice.
    ///
    /// # Errors
    ///
    /// Returns any error of [`LabelScanner::scan`], or
    /// [`RecordError::TooLarge`] if the record would not fit its size field.
    pub fn plan(name_len: usize, label_input: &[u8], scanner: &LabelScanner) -> Result<Self> {
        let mut ctx = ParseContext::new();
        let label_set_len = scanner.scan(label_input, &mut ctx)?;

        // ParseContext already caps the count at MAX_LABEL_COUNT; this only
        // guards the narrowing.
        let label_count =
            u16::try_from(ctx.label_count()).map_err(|_| RecordError::LayoutMismatch {
                planned: MAX_LABEL_COUNT,
                written: ctx.label_count(),
            })?;

        let layout = Self::new(name_len, label_count, ctx.label_bytes(), label_set_len)?;

        tracing::trace!(
            name_len,
            label_count,
            label_bytes = layout.label_bytes,
            size = layout.size,
            "planned record layout"
        );

        Ok(layout)
    }

    /// Computes a layout from already-known region sizes.
    ///
    /// # Errors
    ///
    /// Returns [`MetricNameError::TooLong`] if the name does not fit its
    /// length prefix and [`RecordError::TooLarge`] if the total does not fit
    /// the size field.
    pub fn new(
        name_len: usize,
        label_count: u16,
        label_bytes: usize,
        label_set_len: usize,
    ) -> Result<Self> {
        let max_name = usize::from(u16::MAX);
        if name_len > max_name {
            return Err(MetricNameError::TooLong {
                len: name_len,
                max: max_name,
            }
            .into());
        }

        let size = HEADER_SIZE + name_len + label_bytes + TRAILER_SIZE;
        if u32::try_from(size).is_err() {
            return Err(RecordError::TooLarge { size }.into());
        }

        Ok(Self {
            name_len,
            label_count,
            label_bytes,
            label_set_len,
            size,
        })
    }

    /// Total record size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of labels in the record.
    pub fn label_count(&self) -> u16 {
        self.label_count
    }

    /// Length of the metric name in bytes.
    pub fn name_len(&self) -> usize {
        self.name_len
    }

    /// Size of the encoded label area in bytes.
    pub fn label_bytes(&self) -> usize {
        self.label_bytes
    }

    /// Input bytes covered by the label set, including both braces.
    ///
    /// Zero when the line has no label set.
    pub fn label_set_len(&self) -> usize {
        self.label_set_len
    }

    /// Byte offset of the metric name.
    pub fn name_offset(&self) -> usize {
        HEADER_SIZE
    }

    /// Byte offset of the first label.
    pub fn labels_offset(&self) -> usize {
        HEADER_SIZE + self.name_len
    }

    /// Byte offset of the `f64` value.
    pub fn value_offset(&self) -> usize {
        self.size - TRAILER_SIZE
    }

    /// Byte offset of the `i64` timestamp.
    pub fn timestamp_offset(&self) -> usize {
        self.size - TRAILER_SIZE / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LabelSetError, PromSampleError};

    #[test]
    fn test_layout_without_labels() {
        let scanner = LabelScanner::new(1023);
        let layout = RecordLayout::plan(21, b" 42", &scanner).unwrap();

        assert_eq!(layout.label_count(), 0);
        assert_eq!(layout.label_bytes(), 0);
        assert_eq!(layout.label_set_len(), 0);
        assert_eq!(layout.size(), MIN_RECORD_SIZE + 21);
        assert_eq!(layout.labels_offset(), layout.value_offset());
    }

    #[test]
    fn test_layout_with_labels() {
        let scanner = LabelScanner::new(1023);
        let input = br#"{method="post",code="200"} 1027"#;
        let layout = RecordLayout::plan(19, input, &scanner).unwrap();

        let label_bytes = (6 + 4 + LABEL_OVERHEAD) + (4 + 3 + LABEL_OVERHEAD);
        assert_eq!(layout.label_count(), 2);
        assert_eq!(layout.label_bytes(), label_bytes);
        assert_eq!(layout.label_set_len(), 26);
        assert_eq!(layout.size(), HEADER_SIZE + 19 + label_bytes + TRAILER_SIZE);

        // Regions are contiguous with no gaps.
        assert_eq!(layout.name_offset(), HEADER_SIZE);
        assert_eq!(layout.labels_offset(), HEADER_SIZE + 19);
        assert_eq!(layout.labels_offset() + label_bytes, layout.value_offset());
        assert_eq!(layout.value_offset() + 8, layout.timestamp_offset());
        assert_eq!(layout.timestamp_offset() + 8, layout.size());
    }

    #[test]
    fn test_oversized_name() {
        assert!(matches!(
            RecordLayout::new(70_000, 0, 0, 0),
            Err(PromSampleError::MalformedMetricName(MetricNameError::TooLong { .. }))
        ));
    }

    #[test]
    fn test_oversized_record() {
        assert!(matches!(
            RecordLayout::new(10, 1, u32::MAX as usize, 0),
            Err(PromSampleError::Record(RecordError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_plan_propagates_scan_errors() {
        let scanner = LabelScanner::new(1023);
        assert!(matches!(
            RecordLayout::plan(3, br#"{1abc="x"} 1"#, &scanner),
            Err(PromSampleError::MalformedLabelSet(
                LabelSetError::InvalidFirstChar { .. }
            ))
        ));
    }

    #[test]
    fn test_plan_label_count_limit() {
        let scanner = LabelScanner::new(1023);
        let label_set = |count: usize| format!("{{{}}}", vec![r#"a="""#; count].join(","));

        let layout = RecordLayout::plan(1, label_set(MAX_LABEL_COUNT).as_bytes(), &scanner).unwrap();
        assert_eq!(layout.label_count(), u16::MAX);
        assert_eq!(layout.label_bytes(), MAX_LABEL_COUNT * (1 + LABEL_OVERHEAD));

        assert!(matches!(
            RecordLayout::plan(1, label_set(MAX_LABEL_COUNT + 1).as_bytes(), &scanner),
            Err(PromSampleError::MalformedLabelSet(LabelSetError::TooManyLabels {
                max: 65_535
            }))
        ));
    }
}
