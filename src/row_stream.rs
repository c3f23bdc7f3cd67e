use std::cell::RefCell;
use std::rc::Rc;

use crate::capture::{CaptureProcessor, CaptureState, RowBuffer};
use crate::connection::Connection;
use crate::driver::{flush_pending, wait_for};
use crate::error::{Error, Result, eyre};
use crate::handler::{DiscardRows, RowProcessor};
use crate::poll::Direction;
use crate::policy::{AcceptAll, RowPolicy};
use crate::result::{ExecStatus, ResultObject};
use crate::row::{OwnedRow, materialize};

/// What [`RowStream::next_row`] produced
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Row(OwnedRow),
    /// The resultset is complete; fetch its status with [`RowStream::final_status`]
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The final status was taken
    Idle,
    /// Query queued, not flushed yet
    Sending,
    Receiving,
    /// A row was returned by the last call
    RowReady,
    /// End of stream reached, or drained
    Done,
    Failed,
}

/// Installs a processor and puts the previous one back when dropped
struct ProcessorGuard<'g, C: Connection + ?Sized> {
    conn: &'g mut C,
    saved: Option<Option<Box<dyn RowProcessor>>>,
}

impl<'g, C: Connection + ?Sized> ProcessorGuard<'g, C> {
    fn install(conn: &'g mut C, processor: Box<dyn RowProcessor>) -> Self {
        let saved = conn.set_row_processor(Some(processor));
        tracing::trace!(had_processor = saved.is_some(), "row processor replaced");
        Self {
            conn,
            saved: Some(saved),
        }
    }

    fn conn(&mut self) -> &mut C {
        self.conn
    }
}

impl<C: Connection + ?Sized> Drop for ProcessorGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.conn.set_row_processor(saved);
            tracing::trace!("row processor restored");
        }
    }
}

/// Pull-style access to the rows of one query
///
/// Holds the connection exclusively until dropped. Dropping a stream does not
/// drain it; call [`RowStream::drain`] before reusing the connection when the
/// rows were not consumed to the end.
pub struct RowStream<'c, C: Connection + ?Sized> {
    conn: &'c mut C,
    state: StreamState,
    slot: Rc<RefCell<RowBuffer>>,
    rows_delivered: u64,
    drainable: bool,
    drained: bool,
    final_status: Option<ResultObject>,
}

/// Send `sql` and stream its rows.
pub fn begin_stream<'c, C: Connection + ?Sized>(
    conn: &'c mut C,
    sql: &str,
) -> Result<RowStream<'c, C>> {
    RowStream::begin(conn, sql)
}

impl<'c, C: Connection + ?Sized> RowStream<'c, C> {
    pub fn begin(conn: &'c mut C, sql: &str) -> Result<Self> {
        Self::begin_with_policy(conn, sql, AcceptAll)
    }

    /// Like [`RowStream::begin`], with `policy` deciding about every row.
    pub fn begin_with_policy<P: RowPolicy + 'static>(
        conn: &'c mut C,
        sql: &str,
        policy: P,
    ) -> Result<Self> {
        conn.send_query(sql)?;
        tracing::debug!(sql_len = sql.len(), "stream started");
        Ok(Self {
            conn,
            state: StreamState::Sending,
            slot: Rc::new(RefCell::new(RowBuffer::new(Box::new(policy)))),
            rows_delivered: 0,
            drainable: true,
            drained: false,
            final_status: None,
        })
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn rows_delivered(&self) -> u64 {
        self.rows_delivered
    }

    pub fn connection(&self) -> &C {
        &*self.conn
    }

    /// Return the next row, or `EndOfStream` once the resultset is complete.
    ///
    /// Fused: after the end, every call returns `EndOfStream`. After an error
    /// every call fails with `BadUsageError`.
    pub fn next_row(&mut self) -> Result<RowOutcome> {
        match self.state {
            StreamState::Done | StreamState::Idle => return Ok(RowOutcome::EndOfStream),
            StreamState::Failed => {
                return Err(Error::BadUsageError(
                    "the stream already failed; drain it before reusing the connection"
                        .to_string(),
                ));
            }
            StreamState::Sending | StreamState::Receiving | StreamState::RowReady => {}
        }

        match self.advance() {
            Ok(RowOutcome::Row(row)) => {
                self.rows_delivered += 1;
                self.state = StreamState::RowReady;
                Ok(RowOutcome::Row(row))
            }
            Ok(RowOutcome::EndOfStream) => {
                tracing::debug!(rows = self.rows_delivered, "end of stream");
                self.state = StreamState::Done;
                Ok(RowOutcome::EndOfStream)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> Result<RowOutcome> {
        if self.state == StreamState::Sending {
            flush_pending(&mut *self.conn)?;
            self.state = StreamState::Receiving;
        }

        let slot = Rc::clone(&self.slot);
        slot.borrow_mut().arm();
        let mut guard =
            ProcessorGuard::install(&mut *self.conn, Box::new(CaptureProcessor::new(Rc::clone(&slot))));

        loop {
            let busy = guard.conn().is_busy()?;
            match slot.borrow().state() {
                CaptureState::Signaled(msg) => {
                    return Err(Error::ApplicationSignaled(msg.clone()));
                }
                CaptureState::Captured => {
                    if !busy {
                        return Err(Error::ProtocolViolation(
                            "row captured while the connection reports idle".to_string(),
                        ));
                    }
                    let conn = guard.conn();
                    let handle = conn
                        .captured_row()
                        .ok_or_else(|| Error::LibraryBug(eyre!("captured row is not held")))?;
                    return materialize(handle.header, &handle.row).map(RowOutcome::Row);
                }
                CaptureState::Armed => {}
            }
            if !busy {
                return Ok(RowOutcome::EndOfStream);
            }
            wait_for(guard.conn(), Direction::Read)?;
            guard.conn().consume_input()?;
        }
    }

    fn fail(&mut self, error: &Error) {
        self.drainable = !error.is_conn_broken() && !self.conn.is_broken();
        tracing::debug!(%error, drainable = self.drainable, "stream failed");
        self.state = StreamState::Failed;
    }

    /// Discard the remaining rows and results of the query.
    ///
    /// Keeps the first non-`SingleTuple` result as the final status. A second
    /// call does nothing. Refused when the connection is broken.
    #[tracing::instrument(skip_all)]
    pub fn drain(&mut self) -> Result<()> {
        if self.drained {
            return Ok(());
        }
        if self.conn.is_broken() || !self.drainable {
            return Err(Error::BadUsageError(
                "the connection is broken; the stream cannot be drained".to_string(),
            ));
        }

        match self.collect_results() {
            Ok(first) => {
                tracing::debug!(
                    status = ?first.as_ref().map(|r| r.status),
                    "stream drained"
                );
                self.final_status = first;
                self.drained = true;
                if self.state != StreamState::Idle {
                    self.state = StreamState::Done;
                }
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn collect_results(&mut self) -> Result<Option<ResultObject>> {
        if self.state == StreamState::Sending {
            flush_pending(&mut *self.conn)?;
            self.state = StreamState::Receiving;
        }
        let mut guard = ProcessorGuard::install(&mut *self.conn, Box::new(DiscardRows));
        let mut first = None;
        while let Some(result) = guard.conn().next_result()? {
            if first.is_none() && result.status != ExecStatus::SingleTuple {
                first = Some(result);
            }
        }
        Ok(first)
    }

    /// Take the terminal result of the query.
    ///
    /// Available after `EndOfStream` or after a drain, exactly once.
    pub fn final_status(&mut self) -> Result<ResultObject> {
        match self.state {
            StreamState::Done => {
                self.drain()?;
                self.state = StreamState::Idle;
                self.final_status.take().ok_or_else(|| {
                    Error::BadUsageError("the query produced no final status".to_string())
                })
            }
            StreamState::Idle => Err(Error::BadUsageError(
                "the final status was already taken".to_string(),
            )),
            StreamState::Sending
            | StreamState::Receiving
            | StreamState::RowReady
            | StreamState::Failed => Err(Error::BadUsageError(
                "the stream has not reached its end; drain it first".to_string(),
            )),
        }
    }
}

impl<C: Connection + ?Sized> Iterator for RowStream<'_, C> {
    type Item = Result<OwnedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == StreamState::Failed {
            return None;
        }
        match self.next_row() {
            Ok(RowOutcome::Row(row)) => Some(Ok(row)),
            Ok(RowOutcome::EndOfStream) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<C: Connection + ?Sized> std::fmt::Debug for RowStream<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("state", &self.state)
            .field("rows_delivered", &self.rows_delivered)
            .field("drained", &self.drained)
            .finish_non_exhaustive()
    }
}
