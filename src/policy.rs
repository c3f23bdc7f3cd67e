use auto_impl::auto_impl;

use crate::protocol::RowRef;

/// Decision of a [`RowPolicy`] about one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Stop streaming and fail the resultset with this message
    Abort(String),
}

/// Decides, row by row, whether a stream keeps going
///
/// `index` counts the rows accepted so far by the stream.
#[auto_impl(&mut, Box)]
pub trait RowPolicy {
    fn on_row(&mut self, index: u64, row: &RowRef<'_>) -> Verdict;
}

/// Accepts every row
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl RowPolicy for AcceptAll {
    fn on_row(&mut self, _: u64, _: &RowRef<'_>) -> Verdict {
        Verdict::Accept
    }
}

/// Aborts once `limit` rows were accepted, otherwise defers to `inner`
#[derive(Debug, Clone)]
pub struct AbortAfter<P = AcceptAll> {
    limit: u64,
    inner: P,
}

impl AbortAfter {
    pub fn new(limit: u64) -> Self {
        Self::wrap(limit, AcceptAll)
    }
}

impl<P> AbortAfter<P> {
    pub fn wrap(limit: u64, inner: P) -> Self {
        Self { limit, inner }
    }
}

impl<P: RowPolicy> RowPolicy for AbortAfter<P> {
    fn on_row(&mut self, index: u64, row: &RowRef<'_>) -> Verdict {
        if index >= self.limit {
            return Verdict::Abort(format!("row limit of {} reached", self.limit));
        }
        self.inner.on_row(index, row)
    }
}

/// Adapts a closure into a [`RowPolicy`]
pub struct FnPolicy<F>(pub F);

impl<F> RowPolicy for FnPolicy<F>
where
    F: FnMut(u64, &RowRef<'_>) -> Verdict,
{
    fn on_row(&mut self, index: u64, row: &RowRef<'_>) -> Verdict {
        (self.0)(index, row)
    }
}
