//! Boundary to the client library that implements the wire protocol.
//!
//! The engine owns every buffer that crosses this boundary. Implementations
//! copy into or out of the slices they are handed and never keep them past
//! the call, except for the output bindings registered by
//! [`NativeStatement::bind_result`], which live until the next call to it.
//!
//! Every method that talks to the server blocks the calling thread until the
//! exchange completes or fails.

pub mod codes;
#[cfg(feature = "libmysqlclient")]
pub mod libmysql;
#[cfg(any(test, feature = "test-helpers"))]
pub mod scripted;

use crate::config::{ConnectOption, ConnectTarget};

/// Failure reported by the client library: error number, SQLSTATE and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: u32,
    pub sqlstate: [u8; 5],
    pub message: String,
}

impl NativeError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            sqlstate: *b"HY000",
            message: message.into(),
        }
    }

    pub fn with_sqlstate(mut self, sqlstate: [u8; 5]) -> Self {
        self.sqlstate = sqlstate;
        self
    }
}

pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Column metadata exactly as the client library reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeField {
    pub name: String,
    pub table: Option<String>,
    pub default: Option<String>,
    pub type_code: u32,
    pub max_length: u64,
    pub flags: u32,
    pub decimals: u32,
}

/// One input parameter. Every non-null value is sent as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputBind<'a> {
    Null,
    String(&'a [u8]),
}

/// Per-column indicators filled by a statement fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnSlot {
    pub is_null: bool,
    pub length: u64,
    pub truncated: bool,
}

/// Outcome of advancing a statement cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Row,
    /// A row is available but at least one bound buffer was too small.
    Truncated,
    NoData,
    Error(NativeError),
}

impl FetchStatus {
    /// Maps a raw `mysql_stmt_fetch` return code.
    pub fn from_code(code: i32, error: impl FnOnce() -> NativeError) -> Self {
        match code {
            codes::FETCH_OK => FetchStatus::Row,
            codes::MYSQL_DATA_TRUNCATED => FetchStatus::Truncated,
            codes::MYSQL_NO_DATA => FetchStatus::NoData,
            _ => FetchStatus::Error(error()),
        }
    }
}

/// Why a statement execution failed: while binding inputs or on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    Bind(NativeError),
    Execute(NativeError),
}

/// Entry point of a client library.
pub trait NativeDriver {
    fn name(&self) -> &str;

    /// Allocates an unconnected handle (`mysql_init`).
    fn init(&self) -> NativeResult<Box<dyn NativeConnection>>;

    fn client_info(&self) -> String;
}

/// A connection handle (`MYSQL*`).
pub trait NativeConnection: Send {
    /// Applies one option before the handshake. Client capability flags are
    /// handled by the caller and never reach this method.
    fn set_option(&mut self, option: &ConnectOption) -> NativeResult<()>;

    fn real_connect(&mut self, target: &ConnectTarget, client_flags: u64) -> NativeResult<()>;

    /// Closes the handle. Calling it twice is a no-op.
    fn close(&mut self);

    fn ping(&mut self) -> NativeResult<()>;

    fn change_user(
        &mut self,
        user: Option<&str>,
        password: Option<&str>,
        database: Option<&str>,
    ) -> NativeResult<()>;

    fn select_db(&mut self, database: &str) -> NativeResult<()>;

    fn real_query(&mut self, sql: &[u8]) -> NativeResult<()>;

    /// Buffers the whole result of the last query, `None` when it produced no rows.
    ///
    /// Fails when the query produced columns but the rows could not be transferred.
    fn store_result(&mut self) -> NativeResult<Option<Box<dyn NativeResultSet>>>;

    /// Escapes `input` for the connection's active character set.
    fn real_escape(&self, input: &[u8]) -> NativeResult<Vec<u8>>;

    fn set_character_set(&mut self, charset: &str) -> NativeResult<()>;

    fn host_info(&self) -> String;

    fn server_info(&self) -> String;

    fn proto_info(&self) -> u32;

    fn errno(&self) -> u32;

    fn error(&self) -> String;

    fn affected_rows(&self) -> u64;

    fn insert_id(&self) -> u64;

    /// Allocates a statement handle bound to this connection (`mysql_stmt_init`).
    fn stmt_init(&mut self) -> NativeResult<Box<dyn NativeStatement>>;
}

/// A client-side buffered result (`MYSQL_RES*`). Dropping it frees the rows.
pub trait NativeResultSet: Send {
    fn num_rows(&self) -> u64;

    fn num_fields(&self) -> usize;

    /// Next row as borrowed column values, `None` when exhausted.
    fn fetch_row(&mut self) -> Option<Vec<Option<&[u8]>>>;

    fn data_seek(&mut self, offset: u64);

    /// Next field of the field cursor.
    fn fetch_field(&mut self) -> Option<NativeField>;

    fn fetch_field_direct(&self, index: usize) -> Option<NativeField>;

    fn fetch_fields(&self) -> Vec<NativeField>;
}

/// A prepared statement handle (`MYSQL_STMT*`).
pub trait NativeStatement: Send {
    fn prepare(&mut self, sql: &[u8]) -> NativeResult<()>;

    fn param_count(&self) -> usize;

    fn field_count(&self) -> usize;

    /// Binds `params` and executes. The slices are only read during the call.
    fn execute(&mut self, params: &[InputBind<'_>]) -> Result<(), ExecuteError>;

    /// Registers `columns` zero-length string output bindings.
    fn bind_result(&mut self, columns: usize) -> NativeResult<()>;

    /// Advances the cursor and reports per-column null/length/truncation in `slots`.
    fn fetch(&mut self, slots: &mut [ColumnSlot]) -> FetchStatus;

    /// Copies column `index` of the current row into `buffer`.
    fn fetch_column(&mut self, index: usize, buffer: &mut [u8]) -> NativeResult<()>;

    fn affected_rows(&self) -> u64;

    fn insert_id(&self) -> u64;

    fn errno(&self) -> u32;

    fn error(&self) -> String;

    /// Metadata-only result describing the output columns.
    fn result_metadata(&mut self) -> Option<Box<dyn NativeResultSet>>;

    /// Releases the handle. After the first call the handle is gone even on error.
    fn close(&mut self) -> NativeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_defaults_to_general_sqlstate() {
        let err = NativeError::new(2000, "Unknown MySQL error");
        assert_eq!(err.sqlstate, *b"HY000");
        assert_eq!(err.with_sqlstate(*b"08S01").sqlstate, *b"08S01");
    }

    #[test]
    fn test_fetch_status_from_code() {
        let err = || NativeError::new(codes::CR_SERVER_LOST, "Lost connection");
        assert_eq!(FetchStatus::from_code(0, err), FetchStatus::Row);
        assert_eq!(FetchStatus::from_code(101, err), FetchStatus::Truncated);
        assert_eq!(FetchStatus::from_code(100, err), FetchStatus::NoData);
        assert!(matches!(
            FetchStatus::from_code(1, err),
            FetchStatus::Error(NativeError { code: 2013, .. })
        ));
    }
}
