use crate::constant::{CommandByte, MAX_PACKET_PAYLOAD};
use crate::error::{Error, Result};
use crate::protocol::command::ColumnDefinitionBytes;
use crate::protocol::primitive::*;
use crate::protocol::response::{ErrPayloadBytes, OkPayload, OkPayloadBytes};

/// Write COM_QUERY command payload
pub fn write_query(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::Query as u8);
    out.extend_from_slice(sql.as_bytes());
}

/// One decoded response packet of a COM_QUERY exchange
#[derive(Debug)]
pub enum QueryEvent<'a> {
    /// The statement produced no resultset
    NoResultSet(OkPayloadBytes<'a>),
    /// A resultset with `num_columns` columns follows
    ResultSetStart { num_columns: usize },
    /// A column definition; `remaining` definitions follow it
    Column {
        def: ColumnDefinitionBytes<'a>,
        remaining: usize,
    },
    /// A text row payload
    Row(&'a [u8]),
    /// The resultset is complete
    ResultSetEnd(OkPayloadBytes<'a>),
    /// The server rejected the statement. Nothing follows.
    ServerError(ErrPayloadBytes<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    ReadingFirstPacket,
    ReadingColumns { remaining: usize },
    ReadingRows,
    Finished,
}

/// State machine for the response of one COM_QUERY
///
/// Fed one complete payload at a time. A response with
/// `SERVER_MORE_RESULTS_EXISTS` set on its terminating OK packet continues with
/// the next statement's first packet.
#[derive(Debug)]
pub struct Query {
    state: QueryState,
    started: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            state: QueryState::ReadingFirstPacket,
            started: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == QueryState::Finished
    }

    /// True until the first response packet has been decoded
    pub fn is_pristine(&self) -> bool {
        !self.started
    }

    pub fn step<'a>(&mut self, payload: &'a [u8]) -> Result<QueryEvent<'a>> {
        self.started = true;
        match self.state {
            QueryState::ReadingFirstPacket => match payload.first() {
                Some(0xFF) => {
                    self.state = QueryState::Finished;
                    Ok(QueryEvent::ServerError(ErrPayloadBytes(payload)))
                }
                Some(0x00) => {
                    let ok = OkPayloadBytes(payload);
                    self.after_terminator(ok)?;
                    Ok(QueryEvent::NoResultSet(ok))
                }
                Some(0xFB) => Err(Error::ProtocolViolation(
                    "LOCAL INFILE requests are not supported".to_string(),
                )),
                Some(_) => {
                    let (column_count, rest) = read_int_lenenc(payload)?;
                    if !rest.is_empty() || column_count == 0 {
                        return Err(Error::InvalidPacket);
                    }
                    let num_columns =
                        usize::try_from(column_count).map_err(|_| Error::InvalidPacket)?;
                    self.state = QueryState::ReadingColumns {
                        remaining: num_columns,
                    };
                    Ok(QueryEvent::ResultSetStart { num_columns })
                }
                None => Err(Error::InvalidPacket),
            },

            QueryState::ReadingColumns { remaining } => {
                let remaining = remaining - 1;
                self.state = if remaining == 0 {
                    QueryState::ReadingRows
                } else {
                    QueryState::ReadingColumns { remaining }
                };
                Ok(QueryEvent::Column {
                    def: ColumnDefinitionBytes(payload),
                    remaining,
                })
            }

            QueryState::ReadingRows => {
                // A row's first value is NULL (0xFB) or a length-encoded string,
                // which never starts with 0xFF. A string starting with 0xFE is at
                // least 2^24 bytes long, far longer than any OK packet.
                match payload.first() {
                    Some(0xFF) => {
                        self.state = QueryState::Finished;
                        Ok(QueryEvent::ServerError(ErrPayloadBytes(payload)))
                    }
                    Some(0xFE) if payload.len() < MAX_PACKET_PAYLOAD => {
                        let ok = OkPayloadBytes(payload);
                        self.after_terminator(ok)?;
                        Ok(QueryEvent::ResultSetEnd(ok))
                    }
                    _ => Ok(QueryEvent::Row(payload)),
                }
            }

            QueryState::Finished => Err(Error::ProtocolViolation(
                "packet received after the query completed".to_string(),
            )),
        }
    }

    fn after_terminator(&mut self, ok: OkPayloadBytes<'_>) -> Result<()> {
        let ok = OkPayload::try_from(ok)?;
        self.state = if ok.more_results() {
            QueryState::ReadingFirstPacket
        } else {
            QueryState::Finished
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EOF_LAST: [u8; 7] = [0xFE, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00];
    const EOF_MORE: [u8; 7] = [0xFE, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00];

    #[test]
    fn query_payload() {
        let mut out = Vec::new();
        write_query(&mut out, "SELECT 1");
        assert_eq!(out, b"\x03SELECT 1");
    }

    #[test]
    fn ok_without_resultset() {
        let mut query = Query::new();
        assert!(query.is_pristine());
        let event = query.step(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00]).unwrap();
        assert!(matches!(event, QueryEvent::NoResultSet(_)));
        assert!(query.is_finished());
        assert!(!query.is_pristine());
    }

    #[test]
    fn resultset_sequence() {
        let mut query = Query::new();
        assert!(matches!(
            query.step(&[0x02]).unwrap(),
            QueryEvent::ResultSetStart { num_columns: 2 }
        ));
        assert!(matches!(
            query.step(b"col-a").unwrap(),
            QueryEvent::Column { remaining: 1, .. }
        ));
        assert!(matches!(
            query.step(b"col-b").unwrap(),
            QueryEvent::Column { remaining: 0, .. }
        ));
        assert!(matches!(query.step(&[0x01, b'1', 0xFB]).unwrap(), QueryEvent::Row(_)));
        assert!(matches!(query.step(&EOF_LAST).unwrap(), QueryEvent::ResultSetEnd(_)));
        assert!(query.is_finished());
        assert!(query.step(&EOF_LAST).is_err());
    }

    #[test]
    fn more_results_continue() {
        let mut query = Query::new();
        query.step(&[0x01]).unwrap();
        query.step(b"col").unwrap();
        query.step(&EOF_MORE).unwrap();
        assert!(!query.is_finished());
        assert!(matches!(
            query.step(&[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]).unwrap(),
            QueryEvent::NoResultSet(_)
        ));
        assert!(query.is_finished());
    }

    #[test]
    fn error_mid_rows() {
        let mut query = Query::new();
        query.step(&[0x01]).unwrap();
        query.step(b"col").unwrap();
        query.step(&[0x01, b'x']).unwrap();
        let event = query.step(&[0xFF, 0x10, 0x04, b'b', b'o', b'o', b'm']).unwrap();
        assert!(matches!(event, QueryEvent::ServerError(_)));
        assert!(query.is_finished());
    }

    #[test]
    fn rejects_local_infile_and_empty() {
        assert!(matches!(
            Query::new().step(&[0xFB, b'f']),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(Query::new().step(&[]), Err(Error::InvalidPacket)));
    }
}
