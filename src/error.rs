use std::collections::TryReserveError;

use thiserror::Error;

use crate::protocol::response::ErrPayload;

pub use color_eyre::eyre::eyre;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ErrPayload),

    /// Socket, flush or consume failure. The connection is unusable afterwards.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A row processor or row policy aborted the current statement.
    #[error("Row processing aborted: {0}")]
    ApplicationSignaled(String),

    #[error("Out of memory while materializing a row: {0}")]
    OutOfMemory(#[from] TryReserveError),

    /// The connection reported an inconsistent state.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Bad usage error: {0}")]
    BadUsageError(String),

    #[error("Invalid packet")]
    InvalidPacket,

    #[error("Unexpected end of packet")]
    UnexpectedEof,

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

impl Error {
    /// Whether the connection that produced this error has to be re-established.
    pub fn is_conn_broken(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::ProtocolViolation(_)
                | Error::InvalidPacket
                | Error::UnexpectedEof
                | Error::LibraryBug(_)
        )
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
