//! Record construction: the write pass.
//!
//! [`RecordBuilder::build`] fills a buffer of exactly the planned size with
//! the header, the metric name and the labels, re-running the label scanner
//! with a label writer as its sink. The result is a [`PendingRecord`]
//! whose value and timestamp are assigned exactly once by
//! [`PendingRecord::finish`].

use crate::error::{RecordError, Result};
use crate::layout::{
    HEADER_SIZE, LABEL_COUNT_OFFSET, LEN_PREFIX_SIZE, NAME_LEN_OFFSET, RecordLayout, SIZE_OFFSET,
    TRAILER_SIZE, encoded_label_len,
};
use crate::record::SampleRecord;
use crate::scan::{LabelScanner, LabelSink};

/// Write-mode sink: encodes each accepted label at the next free offset.
struct LabelWriter<'a> {
    area: &'a mut [u8],
    cursor: usize,
}

impl<'a> LabelWriter<'a> {
    fn new(area: &'a mut [u8]) -> Self {
        Self { area, cursor: 0 }
    }

    fn put(&mut self, field: &[u8]) -> Result<()> {
        // The measure pass rejects oversized names and values.
        let len = u16::try_from(field.len()).map_err(|_| RecordError::LayoutMismatch {
            planned: usize::from(u16::MAX),
            written: field.len(),
        })?;
        let start = self.cursor + LEN_PREFIX_SIZE;
        self.area[self.cursor..start].copy_from_slice(&len.to_le_bytes());
        self.area[start..start + field.len()].copy_from_slice(field);
        self.cursor = start + field.len();
        Ok(())
    }
}

impl LabelSink for LabelWriter<'_> {
    fn accept(&mut self, name: &[u8], value: &[u8]) -> Result<()> {
        let needed = encoded_label_len(name.len(), value.len());
        if self.cursor + needed > self.area.len() {
            return Err(RecordError::LayoutMismatch {
                planned: self.area.len(),
                written: self.cursor + needed,
            }
            .into());
        }
        self.put(name)?;
        self.put(value)
    }
}

/// Encodes a record into a buffer sized by a [`RecordLayout`].
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder {
    layout: RecordLayout,
    scanner: LabelScanner,
}

impl RecordBuilder {
    /// Creates a builder for `layout`, scanning labels with `scanner`.
    ///
    /// `scanner` must be configured like the one that produced `layout`.
    pub fn new(layout: RecordLayout, scanner: LabelScanner) -> Self {
        Self { layout, scanner }
    }

    /// Writes the header, `name` and the labels in `label_input` into `buf`.
    ///
    /// `buf` must be zero-initialized and exactly `layout.size()` bytes long;
    /// `label_input` must be the slice the layout was planned from.
    ///
    /// # Errors
    ///
    /// - [`RecordError::AllocationSize`] if `buf` has the wrong length
    /// - [`RecordError::LayoutMismatch`] if the write pass disagrees with the plan
    /// - any scan error, if `label_input` is not the planned input
    pub fn build(&self, mut buf: Vec<u8>, name: &[u8], label_input: &[u8]) -> Result<PendingRecord> {
        let layout = &self.layout;
        if buf.len() != layout.size() {
            return Err(RecordError::AllocationSize {
                expected: layout.size(),
                actual: buf.len(),
            }
            .into());
        }

        if name.len() != layout.name_len() {
            return Err(RecordError::LayoutMismatch {
                planned: layout.name_len(),
                written: name.len(),
            }
            .into());
        }

        let size = u32::try_from(layout.size()).map_err(|_| RecordError::TooLarge {
            size: layout.size(),
        })?;
        let name_len = u16::try_from(name.len()).map_err(|_| RecordError::TooLarge {
            size: layout.size(),
        })?;

        buf[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&size.to_le_bytes());
        buf[LABEL_COUNT_OFFSET..LABEL_COUNT_OFFSET + 2]
            .copy_from_slice(&layout.label_count().to_le_bytes());
        buf[NAME_LEN_OFFSET..NAME_LEN_OFFSET + 2].copy_from_slice(&name_len.to_le_bytes());
        buf[HEADER_SIZE..HEADER_SIZE + name.len()].copy_from_slice(name);

        let mut writer = LabelWriter::new(&mut buf[layout.labels_offset()..layout.value_offset()]);
        let consumed = self.scanner.scan(label_input, &mut writer)?;

        if writer.cursor != layout.label_bytes() {
            return Err(RecordError::LayoutMismatch {
                planned: layout.label_bytes(),
                written: writer.cursor,
            }
            .into());
        }
        if consumed != layout.label_set_len() {
            return Err(RecordError::LayoutMismatch {
                planned: layout.label_set_len(),
                written: consumed,
            }
            .into());
        }

        Ok(PendingRecord { bytes: buf })
    }
}

/// A record whose header, name and labels are written but whose value and
/// timestamp are not yet assigned.
#[derive(Debug)]
pub struct PendingRecord {
    bytes: Vec<u8>,
}

impl PendingRecord {
    /// Assigns the value and timestamp and returns the finished record.
    pub fn finish(mut self, value: f64, timestamp: i64) -> SampleRecord {
        let value_offset = self.bytes.len() - TRAILER_SIZE;
        let timestamp_offset = value_offset + TRAILER_SIZE / 2;
        self.bytes[value_offset..timestamp_offset].copy_from_slice(&value.to_le_bytes());
        self.bytes[timestamp_offset..].copy_from_slice(&timestamp.to_le_bytes());
        SampleRecord::from_built(self.bytes)
    }
}
