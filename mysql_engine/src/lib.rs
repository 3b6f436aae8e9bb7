//! Synchronous MySQL client core: connections, buffered query results and
//! prepared statements on top of a native client library.

pub mod config;
pub mod engine;
mod error;
pub mod escape;
pub mod native;
pub mod observability;
pub mod security;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;
pub mod types;

pub use config::{ConnectOption, ConnectOptions, ConnectTarget, Protocol};
pub use engine::{
    client_info, Connection, QueryResult, Row, Statement, StatementResult,
};
pub use error::{BindStage, ErrorCategory, HandleKind, Mismatch, MysqlError, Result};
pub use escape::{escape, escape_str, unescape};
pub use types::{Field, FieldType};
