use crate::native::{codes, NativeError};
use std::fmt;
use thiserror::Error;

/// Error category for decision-making (retry, abort, reconnect, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - retry may resolve
    Transient,
    /// Fatal error - should abort operation
    Fatal,
    /// Validation error - invalid user input
    Validation,
    /// Connection lost - caller decides whether to reconnect
    ConnectionLost,
}

/// Which kind of handle a `ClosedHandle` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Connection,
    Statement,
}

/// Which native binding call refused a statement's buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStage {
    Params,
    Result,
}

impl fmt::Display for BindStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindStage::Params => f.write_str("mysql_stmt_bind_param"),
            BindStage::Result => f.write_str("mysql_stmt_bind_result"),
        }
    }
}

/// What did not line up between the caller, the statement and the client library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    ParamCount { got: usize, expected: usize },
    Bind { stage: BindStage, code: u32 },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::ParamCount { got, expected } => {
                write!(f, "got {got}, expected {expected} parameters")
            }
            Mismatch::Bind { stage, code } => write!(f, "{stage} = {code}"),
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Connection => f.write_str("connection"),
            HandleKind::Statement => f.write_str("statement"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MysqlError {
    /// Operation attempted on a closed connection or statement. Never reaches the server.
    #[error("{operation} called with closed {handle}")]
    ClosedHandle {
        operation: String,
        handle: HandleKind,
    },

    /// The client library or the server refused the request.
    #[error("{}", render_rejection(.context, .message, .sql.as_deref()))]
    DriverRejected {
        context: String,
        code: u32,
        sqlstate: [u8; 5],
        message: String,
        sql: Option<String>,
    },

    /// Parameter count or buffer binding rejected before any row is read.
    #[error("{context}: {mismatch}")]
    ProtocolMismatch { context: String, mismatch: Mismatch },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NoFetchableData(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

fn render_rejection(context: &str, message: &str, sql: Option<&str>) -> String {
    match sql {
        Some(sql) => format!("{context}: Query : {sql}. Error : {message}"),
        None if context.is_empty() => message.to_string(),
        None => format!("{context}: {message}"),
    }
}

impl MysqlError {
    pub(crate) fn closed_connection(operation: &str) -> Self {
        MysqlError::ClosedHandle {
            operation: format!("Mysql.{operation}"),
            handle: HandleKind::Connection,
        }
    }

    pub(crate) fn closed_statement(operation: &str) -> Self {
        MysqlError::ClosedHandle {
            operation: format!("Mysql.Prepared.{operation}"),
            handle: HandleKind::Statement,
        }
    }

    pub(crate) fn rejected(context: impl Into<String>, err: NativeError) -> Self {
        MysqlError::DriverRejected {
            context: context.into(),
            code: err.code,
            sqlstate: err.sqlstate,
            message: err.message,
            sql: None,
        }
    }

    pub(crate) fn rejected_sql(context: impl Into<String>, err: NativeError, sql: &str) -> Self {
        MysqlError::DriverRejected {
            context: context.into(),
            code: err.code,
            sqlstate: err.sqlstate,
            message: err.message,
            sql: Some(sql.to_string()),
        }
    }

    pub(crate) fn param_count(got: usize, expected: usize) -> Self {
        MysqlError::ProtocolMismatch {
            context: "Mysql.Prepared.execute".to_string(),
            mismatch: Mismatch::ParamCount { got, expected },
        }
    }

    pub(crate) fn bind_failed(stage: BindStage, err: NativeError) -> Self {
        MysqlError::ProtocolMismatch {
            context: "Mysql.Prepared.execute".to_string(),
            mismatch: Mismatch::Bind {
                stage,
                code: err.code,
            },
        }
    }

    pub(crate) fn unknown_option(detail: impl fmt::Display) -> Self {
        MysqlError::InvalidArgument(format!("Mysql.connect: unknown option {detail}"))
    }

    /// Native error code, or 0 for errors raised by this crate.
    pub fn native_code(&self) -> u32 {
        match self {
            MysqlError::DriverRejected { code, .. } => *code,
            MysqlError::ProtocolMismatch {
                mismatch: Mismatch::Bind { code, .. },
                ..
            } => *code,
            _ => 0,
        }
    }

    pub fn sqlstate(&self) -> [u8; 5] {
        match self {
            MysqlError::DriverRejected { sqlstate, .. } => *sqlstate,
            _ => [0u8; 5],
        }
    }

    /// The native error text for driver rejections, the display text otherwise.
    pub fn message(&self) -> String {
        match self {
            MysqlError::DriverRejected { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }

    /// Returns true if this is a connection-related error
    pub fn is_connection_error(&self) -> bool {
        match self {
            MysqlError::ClosedHandle {
                handle: HandleKind::Connection,
                ..
            } => true,
            MysqlError::DriverRejected { .. } | MysqlError::ProtocolMismatch { .. } => {
                codes::is_connection_error(self.native_code())
            }
            _ => false,
        }
    }

    /// Returns true if the error is transient and may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            MysqlError::DriverRejected { code, .. } => {
                *code == codes::ER_LOCK_DEADLOCK || *code == codes::ER_LOCK_WAIT_TIMEOUT
            }
            _ => false,
        }
    }

    /// Returns the error category for decision-making
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            MysqlError::InvalidArgument(_)
            | MysqlError::ProtocolMismatch {
                mismatch: Mismatch::ParamCount { .. },
                ..
            } => ErrorCategory::Validation,
            _ if self.is_connection_error() => ErrorCategory::ConnectionLost,
            _ if self.is_retryable() => ErrorCategory::Transient,
            _ => ErrorCategory::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, MysqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_handle_messages_name_the_operation() {
        let err = MysqlError::closed_connection("ping");
        assert_eq!(err.to_string(), "Mysql.ping called with closed connection");

        let err = MysqlError::closed_statement("execute");
        assert_eq!(
            err.to_string(),
            "Mysql.Prepared.execute called with closed statement"
        );
    }

    #[test]
    fn test_rejection_carries_native_state() {
        let native = NativeError::new(1064, "You have an error in your SQL syntax")
            .with_sqlstate(*b"42000");
        let err = MysqlError::rejected("Mysql.exec", native);

        assert_eq!(err.native_code(), 1064);
        assert_eq!(err.sqlstate(), *b"42000");
        assert_eq!(err.message(), "You have an error in your SQL syntax");
        assert_eq!(
            err.to_string(),
            "Mysql.exec: You have an error in your SQL syntax"
        );
    }

    #[test]
    fn test_rejection_with_sql_mentions_query() {
        let native = NativeError::new(1146, "Table 'testdb.nope' doesn't exist");
        let err = MysqlError::rejected_sql("Mysql.Prepared.create", native, "SELECT * FROM nope");
        let text = err.to_string();
        assert!(text.contains("SELECT * FROM nope"));
        assert!(text.contains("doesn't exist"));
    }

    #[test]
    fn test_rejection_without_context_is_raw_text() {
        let native = NativeError::new(1045, "Access denied for user 'x'@'localhost'");
        let err = MysqlError::rejected("", native);
        assert_eq!(err.to_string(), "Access denied for user 'x'@'localhost'");
    }

    #[test]
    fn test_param_count_message() {
        let err = MysqlError::param_count(2, 1);
        assert!(err.to_string().contains("got 2, expected 1"));
    }

    #[test]
    fn test_bind_failure_keeps_native_code() {
        let err = MysqlError::bind_failed(
            BindStage::Result,
            NativeError::new(codes::CR_OUT_OF_MEMORY, "Client run out of memory"),
        );
        assert_eq!(err.native_code(), codes::CR_OUT_OF_MEMORY);
        assert_eq!(err.error_category(), ErrorCategory::Fatal);
        assert_eq!(
            err.to_string(),
            format!(
                "Mysql.Prepared.execute: mysql_stmt_bind_result = {}",
                codes::CR_OUT_OF_MEMORY
            )
        );

        let lost = MysqlError::bind_failed(
            BindStage::Params,
            NativeError::new(codes::CR_SERVER_LOST, "Lost connection"),
        );
        assert_eq!(lost.error_category(), ErrorCategory::ConnectionLost);
    }

    #[test]
    fn test_non_native_error_defaults() {
        let err = MysqlError::InvalidArgument("Mysql.to_row: offset out of range".to_string());
        assert_eq!(err.native_code(), 0);
        assert_eq!(err.sqlstate(), [0u8; 5]);
        assert_eq!(err.message(), "Mysql.to_row: offset out of range");
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            MysqlError::unknown_option("bogus").error_category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            MysqlError::param_count(0, 1).error_category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            MysqlError::closed_connection("exec").error_category(),
            ErrorCategory::ConnectionLost
        );
        assert_eq!(
            MysqlError::rejected("Mysql.ping", NativeError::new(2006, "MySQL server has gone away"))
                .error_category(),
            ErrorCategory::ConnectionLost
        );
        assert_eq!(
            MysqlError::rejected("Mysql.exec", NativeError::new(1213, "Deadlock found"))
                .error_category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            MysqlError::rejected("Mysql.exec", NativeError::new(1062, "Duplicate entry"))
                .error_category(),
            ErrorCategory::Fatal
        );
        assert_eq!(
            MysqlError::closed_statement("fetch").error_category(),
            ErrorCategory::Fatal
        );
    }
}
