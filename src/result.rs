use std::fmt;
use std::sync::Arc;

use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result};
use crate::protocol::command::ColumnDefinition;
use crate::protocol::response::{ErrPayload, OkPayload};
use crate::row::OwnedRow;

/// Owned metadata of one resultset column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl TryFrom<ColumnDefinition<'_>> for Column {
    type Error = Error;

    fn try_from(def: ColumnDefinition<'_>) -> Result<Self> {
        let text = |b: &[u8]| String::from_utf8_lossy(b).into_owned();
        Ok(Self {
            schema: text(def.schema),
            table: text(def.table_alias),
            org_table: text(def.table_original),
            name: text(def.name_alias),
            org_name: text(def.name_original),
            charset: def.tail.charset(),
            column_length: def.tail.column_length(),
            column_type: def.tail.column_type()?,
            flags: def.tail.flags(),
            decimals: def.tail.decimals(),
        })
    }
}

/// Column metadata shared by every row of a resultset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultHeader {
    columns: Vec<Column>,
}

impl ResultHeader {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Index of the first column labelled `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Status of a result object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// A statement without a resultset completed
    CommandOk,
    /// A resultset completed. Holds its rows unless a processor consumed them.
    TuplesOk,
    /// One row of a resultset in single-row mode
    SingleTuple,
    /// The statement or its row processing failed
    FatalError,
}

impl ExecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommandOk => "COMMAND_OK",
            Self::TuplesOk => "TUPLES_OK",
            Self::SingleTuple => "SINGLE_TUPLE",
            Self::FatalError => "FATAL_ERROR",
        }
    }
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a result object has [`ExecStatus::FatalError`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResultError {
    #[error(transparent)]
    Server(#[from] ErrPayload),
    /// The row processor returned `RowAction::Error`
    #[error("row processing aborted: {0}")]
    Application(String),
}

/// A completed result
#[derive(Debug, Clone)]
pub struct ResultObject {
    pub status: ExecStatus,
    pub header: Option<Arc<ResultHeader>>,
    pub rows: Vec<OwnedRow>,
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub warnings: u16,
    pub info: String,
    pub error: Option<ResultError>,
}

impl ResultObject {
    pub(crate) fn command_ok(ok: &OkPayload) -> Self {
        Self {
            status: ExecStatus::CommandOk,
            header: None,
            rows: Vec::new(),
            affected_rows: ok.affected_rows,
            last_insert_id: ok.last_insert_id,
            warnings: ok.warnings,
            info: ok.info.clone(),
            error: None,
        }
    }

    pub(crate) fn tuples(status: ExecStatus, header: Arc<ResultHeader>, rows: Vec<OwnedRow>) -> Self {
        Self {
            status,
            header: Some(header),
            rows,
            affected_rows: 0,
            last_insert_id: 0,
            warnings: 0,
            info: String::new(),
            error: None,
        }
    }

    pub(crate) fn failed(header: Option<Arc<ResultHeader>>, error: ResultError) -> Self {
        Self {
            status: ExecStatus::FatalError,
            header,
            rows: Vec::new(),
            affected_rows: 0,
            last_insert_id: 0,
            warnings: 0,
            info: String::new(),
            error: Some(error),
        }
    }

    pub fn status(&self) -> ExecStatus {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status != ExecStatus::FatalError
    }

    /// Number of rows held by this result
    pub fn ntuples(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns, zero for a statement without a resultset
    pub fn nfields(&self) -> usize {
        self.header.as_deref().map_or(0, ResultHeader::len)
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Turn a failed result into the matching `Err`.
    pub fn check(self) -> Result<Self> {
        match self.error {
            Some(ResultError::Server(err)) => Err(Error::ServerError(err)),
            Some(ResultError::Application(msg)) => Err(Error::ApplicationSignaled(msg)),
            None => Ok(self),
        }
    }
}
