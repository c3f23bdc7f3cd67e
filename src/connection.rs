use std::os::fd::RawFd;
use std::sync::Arc;

use crate::error::Result;
use crate::handler::RowProcessor;
use crate::poll::Poller;
use crate::protocol::RowRef;
use crate::result::{ResultHeader, ResultObject};

/// Result of one non-blocking flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    /// Nothing left to send
    Complete,
    /// The socket would block; wait for write readiness and flush again
    Pending,
}

/// A row held by the connection after its processor returned `RowAction::Stop`
///
/// Borrowed from the connection, so it cannot outlive the next `&mut` call.
#[derive(Debug, Clone, Copy)]
pub struct RowHandle<'conn> {
    pub header: &'conn Arc<ResultHeader>,
    pub row: RowRef<'conn>,
}

/// A connection that pushes decoded rows into an installed [`RowProcessor`]
///
/// Every `&mut self` method first releases the row held by a previous
/// `RowAction::Stop`.
pub trait Connection {
    /// Queue a query. Fails if another query is still in flight.
    fn send_query(&mut self, sql: &str) -> Result<()>;

    /// Write as much queued output as the socket accepts.
    fn flush(&mut self) -> Result<FlushStatus>;

    /// Read whatever input is available. Never parses.
    fn consume_input(&mut self) -> Result<()>;

    /// Parse buffered input, dispatching rows to the processor.
    ///
    /// `true` while no complete result is available or a row is held.
    fn is_busy(&mut self) -> Result<bool>;

    /// Block until the next result object is complete. `None` once the query
    /// has delivered all its results.
    fn next_result(&mut self) -> Result<Option<ResultObject>>;

    /// Install `processor` (or none) and return the previously installed one.
    fn set_row_processor(
        &mut self,
        processor: Option<Box<dyn RowProcessor>>,
    ) -> Option<Box<dyn RowProcessor>>;

    fn row_processor(&self) -> Option<&dyn RowProcessor>;

    /// The row held after the processor returned `RowAction::Stop`
    fn captured_row(&self) -> Option<RowHandle<'_>>;

    fn socket(&self) -> RawFd;

    fn poller(&self) -> Poller {
        Poller::default()
    }

    /// Whether a transport or protocol failure made the connection unusable
    fn is_broken(&self) -> bool;
}
