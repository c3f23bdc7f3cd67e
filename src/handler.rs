use crate::protocol::RowRef;
use crate::result::ResultHeader;

/// What the connection should do after a row processor saw a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowAction {
    /// Row consumed; keep parsing.
    Continue,
    /// Row consumed and held. Parsing pauses and `is_busy` reports busy; the
    /// row stays readable through `captured_row` until the next `&mut` call.
    Stop,
    /// Fail the current result with this message and discard its remaining rows.
    Error(String),
}

/// Per-row callback installed on a connection
///
/// `row` is `None` once per resultset, after its last row, unless the
/// resultset already failed. Rows handed to a processor are not accumulated
/// into the result object.
pub trait RowProcessor {
    fn process_row(&mut self, header: &ResultHeader, row: Option<RowRef<'_>>) -> RowAction;
}

/// Consumes and forgets every row
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardRows;

impl RowProcessor for DiscardRows {
    fn process_row(&mut self, _: &ResultHeader, _: Option<RowRef<'_>>) -> RowAction {
        RowAction::Continue
    }
}

/// Counts rows and resultsets
#[derive(Debug, Default, Clone)]
pub struct CountRows {
    rows: u64,
    resultsets: u64,
}

impl CountRows {
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Completed resultsets seen so far
    pub fn resultsets(&self) -> u64 {
        self.resultsets
    }
}

impl RowProcessor for CountRows {
    fn process_row(&mut self, _: &ResultHeader, row: Option<RowRef<'_>>) -> RowAction {
        match row {
            Some(_) => self.rows += 1,
            None => self.resultsets += 1,
        }
        RowAction::Continue
    }
}

impl<F> RowProcessor for F
where
    F: FnMut(&ResultHeader, Option<RowRef<'_>>) -> RowAction,
{
    fn process_row(&mut self, header: &ResultHeader, row: Option<RowRef<'_>>) -> RowAction {
        self(header, row)
    }
}
