use std::collections::VecDeque;
use std::io::{self, Write};
use std::net::TcpStream;
use std::ops::Range;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use crate::buffer_pool::PooledBufferSet;
use crate::connection::{Connection, FlushStatus, RowHandle};
use crate::driver::{flush_pending, wait_for};
use crate::error::{Error, Result, eyre};
use crate::handler::{RowAction, RowProcessor};
use crate::opts::Opts;
use crate::poll::{Direction, Poller};
use crate::protocol::RowRef;
use crate::protocol::command::{ColumnDefinition, Query, QueryEvent, write_query};
use crate::protocol::packet::{scan_frame, write_packets};
use crate::protocol::response::{ErrPayload, OkPayload};
use crate::result::{Column, ExecStatus, ResultError, ResultHeader, ResultObject};
use crate::row::{OwnedRow, materialize};
use crate::sync::stream::Stream;

/// Where a decoded payload lives
#[derive(Debug, Clone)]
enum PayloadLoc {
    /// Inside the read buffer
    Read(Range<usize>),
    /// Reassembled from continued packets in the payload buffer
    Assembled,
}

/// The resultset currently being received
#[derive(Debug)]
struct ResultSetState {
    columns: Vec<Column>,
    header: Option<Arc<ResultHeader>>,
    rows: Vec<OwnedRow>,
    error: Option<ResultError>,
}

/// A non-blocking connection on an established session
///
/// Requests are framed and queued by `send_query` and written by `flush`.
/// Responses are read by `consume_input` and decoded by `is_busy` /
/// `next_result`, which hand rows to the installed [`RowProcessor`] or, without
/// one, collect them into the result object.
pub struct Conn {
    stream: Stream,
    buffer_set: PooledBufferSet,
    poller: Poller,
    read_chunk_size: usize,
    processor: Option<Box<dyn RowProcessor>>,
    query: Option<Query>,
    resultset: Option<ResultSetState>,
    ready: VecDeque<ResultObject>,
    held: Option<PayloadLoc>,
    sequence_id: u8,
    assembling: bool,
    single_row_mode: bool,
    broken: bool,
}

impl Conn {
    /// Connect the socket described by `opts`.
    ///
    /// The session on the other end must already be authenticated.
    pub fn new<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts: Opts = opts.try_into()?;

        if let Some(socket) = &opts.socket {
            let stream = UnixStream::connect(socket)?;
            return Self::from_unix(stream, opts);
        }

        let host = opts.host.as_ref().ok_or_else(|| {
            Error::BadConfigError("Missing host in connection options".to_string())
        })?;
        let stream = TcpStream::connect((host.as_str(), opts.port))?;
        Self::from_tcp(stream, opts)
    }

    pub fn from_tcp(stream: TcpStream, opts: Opts) -> Result<Self> {
        let stream = Stream::tcp(stream, opts.tcp_nodelay)?;
        Ok(Self::with_stream(stream, &opts))
    }

    pub fn from_unix(stream: UnixStream, opts: Opts) -> Result<Self> {
        let stream = Stream::unix(stream)?;
        Ok(Self::with_stream(stream, &opts))
    }

    fn with_stream(stream: Stream, opts: &Opts) -> Self {
        Self {
            stream,
            buffer_set: opts.buffer_pool.get_buffer_set(),
            poller: Poller::new(opts.poll_interval),
            read_chunk_size: opts.read_chunk_size,
            processor: None,
            query: None,
            resultset: None,
            ready: VecDeque::new(),
            held: None,
            sequence_id: 0,
            assembling: false,
            single_row_mode: false,
            broken: false,
        }
    }

    /// Send `sql`, wait for all its results and return the last one.
    ///
    /// Rows go to the installed processor, if any.
    #[tracing::instrument(skip_all)]
    pub fn exec(&mut self, sql: &str) -> Result<ResultObject> {
        self.send_query(sql)?;
        flush_pending(self)?;
        let mut last = None;
        while let Some(result) = self.next_result()? {
            last = Some(result);
        }
        last.ok_or_else(|| Error::LibraryBug(eyre!("query completed without a result")))
    }

    /// Deliver each row of the in-flight query as its own `SingleTuple` result.
    ///
    /// Only valid right after `send_query`, before any response was decoded.
    /// Has no effect on rows taken by an installed processor.
    pub fn set_single_row_mode(&mut self) -> Result<()> {
        match &self.query {
            Some(query) if query.is_pristine() => {
                self.single_row_mode = true;
                Ok(())
            }
            _ => Err(Error::BadUsageError(
                "single-row mode must be selected right after send_query".to_string(),
            )),
        }
    }

    /// Whether a query was sent and has not delivered all its results
    pub fn in_flight(&self) -> bool {
        self.query.is_some() || !self.ready.is_empty()
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.broken {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection is broken",
            )));
        }
        Ok(())
    }

    fn release_held(&mut self) {
        if self.held.take().is_some() {
            tracing::trace!("held row released");
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        if error.is_conn_broken() {
            tracing::warn!(%error, "connection broken");
            self.broken = true;
        }
        error
    }

    /// Decode buffered packets until a row is held, a result is complete or
    /// more input is needed.
    fn parse_input(&mut self) -> Result<()> {
        while self.held.is_none() && self.ready.is_empty() && self.query.is_some() {
            let Some(loc) = self.next_payload()? else {
                break;
            };
            self.handle_payload(loc)?;
        }
        Ok(())
    }

    fn next_payload(&mut self) -> Result<Option<PayloadLoc>> {
        loop {
            let Some(frame) = scan_frame(self.buffer_set.unread()) else {
                return Ok(None);
            };
            if frame.sequence_id != self.sequence_id {
                return Err(Error::ProtocolViolation(format!(
                    "packet sequence {} received, {} expected",
                    frame.sequence_id, self.sequence_id
                )));
            }
            self.sequence_id = frame.sequence_id.wrapping_add(1);

            let start = self.buffer_set.read_pos();
            let payload = start + frame.payload.start..start + frame.payload.end;
            self.buffer_set.consume(frame.end());
            tracing::trace!(len = payload.len(), seq = frame.sequence_id, "packet");

            if !frame.continues() && !self.assembling {
                return Ok(Some(PayloadLoc::Read(payload)));
            }

            let buffer_set = &mut *self.buffer_set;
            if !self.assembling {
                buffer_set.payload_buffer.clear();
                self.assembling = true;
            }
            let chunk = buffer_set
                .read_buffer
                .get(payload)
                .ok_or_else(|| Error::LibraryBug(eyre!("frame outside the read buffer")))?;
            buffer_set.payload_buffer.try_reserve(chunk.len())?;
            buffer_set.payload_buffer.extend_from_slice(chunk);
            if !frame.continues() {
                self.assembling = false;
                return Ok(Some(PayloadLoc::Assembled));
            }
        }
    }

    fn handle_payload(&mut self, loc: PayloadLoc) -> Result<()> {
        let Self {
            buffer_set,
            processor,
            query,
            resultset,
            ready,
            held,
            single_row_mode,
            ..
        } = self;

        let payload: &[u8] = match &loc {
            PayloadLoc::Read(range) => buffer_set
                .read_buffer
                .get(range.clone())
                .ok_or_else(|| Error::LibraryBug(eyre!("payload outside the read buffer")))?,
            PayloadLoc::Assembled => &buffer_set.payload_buffer,
        };
        let Some(machine) = query.as_mut() else {
            return Err(Error::LibraryBug(eyre!("payload decoded without a query")));
        };
        let event = machine.step(payload)?;
        let finished = machine.is_finished();

        match event {
            QueryEvent::NoResultSet(ok) => {
                let ok = OkPayload::try_from(ok)?;
                ready.push_back(ResultObject::command_ok(&ok));
            }
            QueryEvent::ResultSetStart { num_columns } => {
                *resultset = Some(ResultSetState {
                    columns: Vec::with_capacity(num_columns.min(4096)),
                    header: None,
                    rows: Vec::new(),
                    error: None,
                });
            }
            QueryEvent::Column { def, remaining } => {
                let rs = resultset
                    .as_mut()
                    .ok_or_else(|| Error::LibraryBug(eyre!("column outside a resultset")))?;
                rs.columns.push(Column::try_from(ColumnDefinition::try_from(def)?)?);
                if remaining == 0 {
                    let columns = std::mem::take(&mut rs.columns);
                    rs.header = Some(Arc::new(ResultHeader::new(columns)));
                }
            }
            QueryEvent::Row(row) => {
                let rs = resultset
                    .as_mut()
                    .ok_or_else(|| Error::LibraryBug(eyre!("row outside a resultset")))?;
                let header = rs
                    .header
                    .clone()
                    .ok_or_else(|| Error::LibraryBug(eyre!("row before column definitions")))?;
                if rs.error.is_some() {
                    // the resultset failed; remaining rows are dropped
                    return Ok(());
                }
                let row = RowRef::new(row, header.len())?;
                if let Some(processor) = processor.as_mut() {
                    match processor.process_row(&header, Some(row)) {
                        RowAction::Continue => {}
                        RowAction::Stop => *held = Some(loc.clone()),
                        RowAction::Error(msg) => {
                            tracing::debug!(%msg, "row processor failed the resultset");
                            rs.error = Some(ResultError::Application(msg));
                        }
                    }
                } else if *single_row_mode {
                    let row = materialize(&header, &row)?;
                    ready.push_back(ResultObject::tuples(
                        ExecStatus::SingleTuple,
                        header,
                        vec![row],
                    ));
                } else {
                    rs.rows.try_reserve(1)?;
                    rs.rows.push(materialize(&header, &row)?);
                }
            }
            QueryEvent::ResultSetEnd(ok) => {
                let ok = OkPayload::try_from(ok)?;
                let mut rs = resultset
                    .take()
                    .ok_or_else(|| Error::LibraryBug(eyre!("resultset end without a start")))?;
                let header = rs
                    .header
                    .take()
                    .ok_or_else(|| Error::LibraryBug(eyre!("resultset ended before its columns")))?;
                if rs.error.is_none()
                    && let Some(processor) = processor.as_mut()
                    && let RowAction::Error(msg) = processor.process_row(&header, None)
                {
                    rs.error = Some(ResultError::Application(msg));
                }
                let result = match rs.error {
                    Some(error) => ResultObject::failed(Some(header), error),
                    None => {
                        let rows = if *single_row_mode { Vec::new() } else { rs.rows };
                        let mut result = ResultObject::tuples(ExecStatus::TuplesOk, header, rows);
                        result.affected_rows = ok.affected_rows;
                        result.last_insert_id = ok.last_insert_id;
                        result.warnings = ok.warnings;
                        result.info = ok.info;
                        result
                    }
                };
                ready.push_back(result);
            }
            QueryEvent::ServerError(err) => {
                let err = ErrPayload::try_from(err)?;
                tracing::debug!(%err, "server error");
                let header = resultset.take().and_then(|rs| rs.header);
                ready.push_back(ResultObject::failed(header, ResultError::Server(err)));
            }
        }

        if finished {
            *query = None;
            *single_row_mode = false;
        }
        Ok(())
    }
}

impl Connection for Conn {
    fn send_query(&mut self, sql: &str) -> Result<()> {
        self.release_held();
        self.ensure_usable()?;
        if self.in_flight() {
            return Err(Error::BadUsageError(
                "another query is still in flight on this connection".to_string(),
            ));
        }

        let mut payload = Vec::new();
        payload.try_reserve_exact(sql.len() + 1)?;
        write_query(&mut payload, sql);
        self.sequence_id = write_packets(self.buffer_set.write_buffer_mut(), &payload, 0);
        self.query = Some(Query::new());
        self.assembling = false;
        self.single_row_mode = false;
        tracing::debug!(len = payload.len(), "query queued");
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    fn flush(&mut self) -> Result<FlushStatus> {
        self.release_held();
        self.ensure_usable()?;
        while !self.buffer_set.unsent().is_empty() {
            match self.stream.write(self.buffer_set.unsent()) {
                Ok(0) => {
                    let error = Error::Transport(io::ErrorKind::WriteZero.into());
                    return Err(self.fail(error));
                }
                Ok(n) => {
                    tracing::trace!(bytes = n, "written");
                    self.buffer_set.advance_write(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(FlushStatus::Pending);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.fail(e.into())),
            }
        }
        Ok(FlushStatus::Complete)
    }

    #[tracing::instrument(skip_all)]
    fn consume_input(&mut self) -> Result<()> {
        self.release_held();
        self.ensure_usable()?;
        self.buffer_set.compact();

        let mut total = 0;
        loop {
            match self.buffer_set.fill_from(&mut self.stream, self.read_chunk_size) {
                Ok(0) if total > 0 => break,
                Ok(0) => {
                    let error = Error::Transport(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "server closed the connection",
                    ));
                    return Err(self.fail(error));
                }
                Ok(n) => {
                    total += n;
                    if n < self.read_chunk_size {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.fail(e.into())),
            }
        }
        tracing::trace!(bytes = total, "input consumed");
        Ok(())
    }

    fn is_busy(&mut self) -> Result<bool> {
        self.release_held();
        self.ensure_usable()?;
        if let Err(e) = self.parse_input() {
            return Err(self.fail(e));
        }
        Ok(self.held.is_some() || (self.ready.is_empty() && self.query.is_some()))
    }

    #[tracing::instrument(skip_all)]
    fn next_result(&mut self) -> Result<Option<ResultObject>> {
        loop {
            self.release_held();
            if let Some(result) = self.ready.pop_front() {
                return Ok(Some(result));
            }
            if self.query.is_none() {
                return Ok(None);
            }
            self.ensure_usable()?;
            if let Err(e) = self.parse_input() {
                return Err(self.fail(e));
            }
            if !self.ready.is_empty() || self.held.is_some() || self.query.is_none() {
                continue;
            }
            if self.flush()? == FlushStatus::Pending {
                wait_for(self, Direction::Write)?;
                continue;
            }
            wait_for(self, Direction::Read)?;
            self.consume_input()?;
        }
    }

    fn set_row_processor(
        &mut self,
        processor: Option<Box<dyn RowProcessor>>,
    ) -> Option<Box<dyn RowProcessor>> {
        self.release_held();
        std::mem::replace(&mut self.processor, processor)
    }

    fn row_processor(&self) -> Option<&dyn RowProcessor> {
        self.processor.as_deref()
    }

    fn captured_row(&self) -> Option<RowHandle<'_>> {
        let header = self.resultset.as_ref()?.header.as_ref()?;
        let payload = match self.held.as_ref()? {
            PayloadLoc::Read(range) => self.buffer_set.read_buffer.get(range.clone())?,
            PayloadLoc::Assembled => &self.buffer_set.payload_buffer,
        };
        let row = RowRef::new(payload, header.len()).ok()?;
        Some(RowHandle { header, row })
    }

    fn socket(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn poller(&self) -> Poller {
        self.poller
    }

    fn is_broken(&self) -> bool {
        self.broken
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("stream", &self.stream)
            .field("in_flight", &self.in_flight())
            .field("has_processor", &self.processor.is_some())
            .field("single_row_mode", &self.single_row_mode)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}
