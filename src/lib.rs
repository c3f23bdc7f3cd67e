mod buffer;
mod buffer_pool;
pub mod capture;
pub mod connection;
pub mod constant;
pub mod driver;
pub mod error;
pub mod handler;
mod opts;
pub mod policy;
pub mod poll;
pub mod protocol;
pub mod result;
pub mod row;
pub mod row_stream;
pub mod sync;

pub use buffer::BufferSet;
pub use buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL, PooledBufferSet};
pub use connection::{Connection, FlushStatus, RowHandle};
pub use error::{Error, Result};
pub use handler::{CountRows, DiscardRows, RowAction, RowProcessor};
pub use opts::Opts;
pub use policy::{AbortAfter, AcceptAll, FnPolicy, RowPolicy, Verdict};
pub use poll::{Direction, Poller, Readiness};
pub use result::{Column, ExecStatus, ResultError, ResultHeader, ResultObject};
pub use row::{OwnedRow, materialize};
pub use row_stream::{RowOutcome, RowStream, StreamState, begin_stream};

#[cfg(test)]
mod buffer_test;
