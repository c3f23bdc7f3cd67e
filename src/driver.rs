//! Event-loop helpers shared by the row stream and the blocking entry points.

use crate::connection::{Connection, FlushStatus};
use crate::error::Result;
use crate::poll::{Direction, Readiness};
use crate::result::ResultObject;

/// Wait until the connection's socket is ready in `direction`.
///
/// Interrupted and expired waits are retried.
pub fn wait_for<C: Connection + ?Sized>(conn: &C, direction: Direction) -> Result<()> {
    let poller = conn.poller();
    let fd = conn.socket();
    loop {
        match poller.wait(fd, direction)? {
            Readiness::Ready => return Ok(()),
            Readiness::Interrupted | Readiness::TimedOut => {}
        }
    }
}

/// Flush queued output, waiting for write readiness whenever the socket is full.
pub fn flush_pending<C: Connection + ?Sized>(conn: &mut C) -> Result<()> {
    while conn.flush()? == FlushStatus::Pending {
        wait_for(conn, Direction::Write)?;
    }
    Ok(())
}

/// Run `sql` on a non-blocking connection and hand every result to `on_result`.
///
/// Rows go to whichever processor is installed. Returns the number of results.
#[tracing::instrument(skip_all)]
pub fn run_query<C, F>(conn: &mut C, sql: &str, mut on_result: F) -> Result<usize>
where
    C: Connection + ?Sized,
    F: FnMut(ResultObject),
{
    conn.send_query(sql)?;
    let mut count = 0;
    let mut flushed = false;
    loop {
        if !flushed {
            match conn.flush()? {
                FlushStatus::Complete => flushed = true,
                FlushStatus::Pending => {
                    wait_for(conn, Direction::Write)?;
                    continue;
                }
            }
        }
        if conn.is_busy()? {
            // a held row is released by the next call; input may already be buffered
            if conn.captured_row().is_none() {
                wait_for(conn, Direction::Read)?;
                conn.consume_input()?;
            }
            continue;
        }
        match conn.next_result()? {
            Some(result) => {
                tracing::trace!(status = %result.status, "result ready");
                count += 1;
                on_result(result);
            }
            None => return Ok(count),
        }
    }
}
