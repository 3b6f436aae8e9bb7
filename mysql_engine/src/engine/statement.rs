use super::binding::{OutputBindings, ParamBuffers};
use super::{Connection, QueryResult, Row};
use crate::error::{BindStage, MysqlError, Result};
use crate::native::{ExecuteError, FetchStatus, NativeStatement};
use log::Level;

/// A server-side prepared statement.
///
/// Borrows its [`Connection`]. Each [`execute`](Statement::execute) returns a
/// [`StatementResult`] that mutably borrows the statement, so a result can
/// never outlive the execution it belongs to.
pub struct Statement<'c> {
    conn: &'c Connection,
    native: Option<Box<dyn NativeStatement>>,
    sql: String,
    param_count: usize,
    strict_fetch: bool,
}

impl<'c> Statement<'c> {
    pub(crate) fn new(
        conn: &'c Connection,
        native: Box<dyn NativeStatement>,
        sql: &str,
        param_count: usize,
    ) -> Self {
        Self {
            conn,
            native: Some(native),
            sql: sql.to_string(),
            param_count,
            strict_fetch: false,
        }
    }

    fn native(&self, operation: &str) -> Result<&dyn NativeStatement> {
        let native = self
            .native
            .as_deref()
            .ok_or_else(|| MysqlError::closed_statement(operation))?;
        if !self.conn.is_open() {
            return Err(MysqlError::closed_connection(&format!("Prepared.{operation}")));
        }
        Ok(native)
    }

    fn native_mut(&mut self, operation: &str) -> Result<&mut Box<dyn NativeStatement>> {
        let conn = self.conn;
        let native = self
            .native
            .as_mut()
            .ok_or_else(|| MysqlError::closed_statement(operation))?;
        if !conn.is_open() {
            return Err(MysqlError::closed_connection(&format!("Prepared.{operation}")));
        }
        Ok(native)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    pub fn is_closed(&self) -> bool {
        self.native.is_none()
    }

    /// Surface native fetch errors instead of reporting them as the end of rows.
    pub fn set_strict_fetch(&mut self, strict: bool) {
        self.strict_fetch = strict;
    }

    pub fn strict_fetch(&self) -> bool {
        self.strict_fetch
    }

    fn check_param_count(&self, got: usize) -> Result<()> {
        if got != self.param_count {
            return Err(self.conn.fail(MysqlError::param_count(got, self.param_count)));
        }
        Ok(())
    }

    /// Executes with every parameter bound as a string. Blocks until the server answers.
    pub fn execute<P: AsRef<[u8]>>(&mut self, params: &[P]) -> Result<StatementResult<'_, 'c>> {
        self.native("execute")?;
        self.check_param_count(params.len())?;
        let buffers = ParamBuffers::from_values(params.iter().map(|p| Some(p.as_ref())));
        self.run(buffers)
    }

    /// Executes with optional parameters; `None` binds SQL NULL. Blocks until the server answers.
    pub fn execute_null<P: AsRef<[u8]>>(
        &mut self,
        params: &[Option<P>],
    ) -> Result<StatementResult<'_, 'c>> {
        self.native("execute")?;
        self.check_param_count(params.len())?;
        let buffers =
            ParamBuffers::from_values(params.iter().map(|p| p.as_ref().map(AsRef::as_ref)));
        self.run(buffers)
    }

    fn run(&mut self, params: ParamBuffers) -> Result<StatementResult<'_, 'c>> {
        let conn = self.conn;
        let native = self.native_mut("execute")?;
        let outcome = native.execute(&params.binds());
        drop(params);
        match outcome {
            Ok(()) => {}
            Err(ExecuteError::Bind(err)) => {
                return Err(conn.fail(MysqlError::bind_failed(BindStage::Params, err)));
            }
            Err(ExecuteError::Execute(err)) => {
                return Err(conn.fail(MysqlError::rejected("Mysql.Prepared.execute", err)));
            }
        }

        let columns = native.field_count();
        native
            .bind_result(columns)
            .map_err(|err| conn.fail(MysqlError::bind_failed(BindStage::Result, err)))?;
        conn.metrics_handle().record_execute();
        conn.logger().log_query(
            Level::Debug,
            "Execute",
            &self.sql,
            &[("columns", columns.to_string())],
        );

        Ok(StatementResult {
            stmt: self,
            output: OutputBindings::new(columns),
        })
    }

    /// Rows affected by the last execution.
    pub fn affected_rows(&self) -> Result<u64> {
        Ok(self.native("affected")?.affected_rows())
    }

    pub fn insert_id(&self) -> Result<u64> {
        Ok(self.native("insert_id")?.insert_id())
    }

    /// Last native error code for this statement, 0 when none.
    pub fn status(&self) -> Result<u32> {
        Ok(self.native("status")?.errno())
    }

    /// Last native error message, `None` when none.
    pub fn error(&self) -> Result<Option<String>> {
        let message = self.native("error")?.error();
        Ok((!message.is_empty()).then_some(message))
    }

    /// Column descriptors of the statement's result, available before any execute.
    pub fn result_metadata(&mut self) -> Result<QueryResult<'c>> {
        let metadata = self.native_mut("result_metadata")?.result_metadata();
        Ok(QueryResult::new(metadata))
    }

    /// Releases the server-side statement. A native close failure is logged, never returned.
    pub fn close(&mut self) -> Result<()> {
        let mut native = self
            .native
            .take()
            .ok_or_else(|| MysqlError::closed_statement("close"))?;
        if let Err(err) = native.close() {
            self.conn
                .logger()
                .log_release_failure("statement", &err.message);
        }
        Ok(())
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Some(mut native) = self.native.take() {
            if let Err(err) = native.close() {
                self.conn
                    .logger()
                    .log_release_failure("statement", &err.message);
            }
        }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("param_count", &self.param_count)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Output of one [`Statement::execute`]. Superseded by the next execute.
pub struct StatementResult<'s, 'c> {
    stmt: &'s mut Statement<'c>,
    output: OutputBindings,
}

impl<'s, 'c> StatementResult<'s, 'c> {
    pub fn column_count(&self) -> usize {
        self.output.len()
    }

    /// Whether column `index` of the last fetched row was NULL.
    pub fn is_null(&self, index: usize) -> Option<bool> {
        self.output.slot(index).map(|s| s.is_null)
    }

    /// Byte length of column `index` in the last fetched row.
    pub fn length(&self, index: usize) -> Option<u64> {
        self.output.slot(index).map(|s| s.length)
    }

    /// Whether column `index` did not fit its bound buffer on the last fetch.
    pub fn truncated(&self, index: usize) -> Option<bool> {
        self.output.slot(index).map(|s| s.truncated)
    }

    /// Next row, `None` when the rows are exhausted.
    ///
    /// A native fetch error is reported as `None` unless strict fetch is enabled
    /// on the statement. Blocks while the row is read from the server.
    pub fn fetch(&mut self) -> Result<Option<Row>> {
        let strict = self.stmt.strict_fetch;
        let conn = self.stmt.conn;
        let native = self.stmt.native_mut("fetch")?;

        if self.output.is_empty() {
            if strict {
                return Err(MysqlError::NoFetchableData(
                    "Mysql.Prepared.fetch: statement returned no columns".to_string(),
                ));
            }
            return Ok(None);
        }

        match native.fetch(self.output.slots_mut()) {
            FetchStatus::Row | FetchStatus::Truncated => {}
            FetchStatus::NoData => return Ok(None),
            FetchStatus::Error(err) if strict => {
                return Err(conn.fail(MysqlError::rejected("Mysql.Prepared.fetch", err)));
            }
            FetchStatus::Error(err) => {
                log::debug!(
                    "Mysql.Prepared.fetch: native error {} ends the rows: {}",
                    err.code,
                    err.message
                );
                return Ok(None);
            }
        }

        let mut values = Vec::with_capacity(self.output.len());
        for (index, slot) in self.output.slots().iter().enumerate() {
            if slot.is_null {
                values.push(None);
                continue;
            }
            let length = usize::try_from(slot.length).map_err(|_| {
                MysqlError::InternalError(format!(
                    "column {index} length {} exceeds addressable memory",
                    slot.length
                ))
            })?;
            let mut buffer = vec![0u8; length];
            if length > 0 {
                native
                    .fetch_column(index, &mut buffer)
                    .map_err(|err| conn.fail(MysqlError::rejected("Mysql.Prepared.fetch", err)))?;
            }
            values.push(Some(buffer));
        }
        Ok(Some(Row::new(values)))
    }

    pub fn rows(&mut self) -> StatementRows<'_, 's, 'c> {
        StatementRows {
            result: self,
            done: false,
        }
    }

    pub fn affected_rows(&self) -> Result<u64> {
        self.stmt.affected_rows()
    }

    pub fn insert_id(&self) -> Result<u64> {
        self.stmt.insert_id()
    }
}

impl std::fmt::Debug for StatementResult<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementResult")
            .field("sql", &self.stmt.sql)
            .field("columns", &self.output.len())
            .finish()
    }
}

/// Iterator over the remaining rows of a [`StatementResult`]. Stops after the first error.
pub struct StatementRows<'r, 's, 'c> {
    result: &'r mut StatementResult<'s, 'c>,
    done: bool,
}

impl Iterator for StatementRows<'_, '_, '_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.result.fetch() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
