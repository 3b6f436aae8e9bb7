mod binding;
pub mod connection;
pub mod result;
pub mod statement;

pub use connection::{client_info, Connection};
pub use result::{QueryResult, Row, Rows};
pub use statement::{Statement, StatementResult, StatementRows};
