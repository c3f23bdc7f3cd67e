use std::ops::Range;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::RowRef;
use crate::result::ResultHeader;

/// A row copied out of the connection's buffers
///
/// All values live in one contiguous buffer; `ranges[i]` locates column `i`,
/// `None` meaning SQL NULL.
#[derive(Debug, Clone)]
pub struct OwnedRow {
    header: Arc<ResultHeader>,
    data: Vec<u8>,
    ranges: Vec<Option<Range<usize>>>,
}

/// Copy a borrowed row into an [`OwnedRow`].
///
/// Reservations are fallible: when the allocator refuses, the error is
/// `Error::OutOfMemory` and nothing is retained.
pub fn materialize(header: &Arc<ResultHeader>, row: &RowRef<'_>) -> Result<OwnedRow> {
    if row.num_columns() != header.len() {
        return Err(Error::ProtocolViolation(format!(
            "row has {} values but the resultset has {} columns",
            row.num_columns(),
            header.len()
        )));
    }

    let mut total = 0usize;
    for value in row.values() {
        total += value?.map_or(0, <[u8]>::len);
    }

    let mut data = Vec::new();
    data.try_reserve_exact(total)?;
    let mut ranges = Vec::new();
    ranges.try_reserve_exact(row.num_columns())?;

    for value in row.values() {
        ranges.push(value?.map(|bytes| {
            let start = data.len();
            data.extend_from_slice(bytes);
            start..data.len()
        }));
    }

    Ok(OwnedRow {
        header: Arc::clone(header),
        data,
        ranges,
    })
}

impl OwnedRow {
    pub fn header(&self) -> &Arc<ResultHeader> {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Bytes of column `idx`; `None` for NULL or an out-of-range index.
    pub fn get(&self, idx: usize) -> Option<&[u8]> {
        let range = self.ranges.get(idx)?.clone()?;
        self.data.get(range)
    }

    pub fn is_null(&self, idx: usize) -> bool {
        matches!(self.ranges.get(idx), Some(None))
    }

    /// Column `idx` as UTF-8 text
    pub fn get_str(&self, idx: usize) -> Result<Option<&str>> {
        if idx >= self.len() {
            return Err(Error::BadUsageError(format!("no column at index {idx}")));
        }
        self.get(idx)
            .map(|bytes| {
                simdutf8::basic::from_utf8(bytes).map_err(|_| {
                    Error::BadUsageError(format!("column {idx} is not valid UTF-8"))
                })
            })
            .transpose()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&[u8]> {
        self.get(self.header.position(name)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&[u8]>> + '_ {
        self.ranges
            .iter()
            .map(|range| range.clone().and_then(|r| self.data.get(r)))
    }
}

impl PartialEq for OwnedRow {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.ranges == other.ranges
    }
}
