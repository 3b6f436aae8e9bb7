use super::{QueryResult, Statement};
use crate::config::{ConnectOptions, ConnectTarget};
use crate::error::{MysqlError, Result};
use crate::native::{NativeConnection, NativeDriver};
use crate::observability::{Metrics, MetricsSnapshot, StructuredLogger};
use log::Level;
use std::cell::{RefCell, RefMut};
use std::time::Instant;

/// An open session with one server.
///
/// Every method except [`Connection::connect`] fails with
/// [`MysqlError::ClosedHandle`] after [`Connection::disconnect`], without
/// contacting the server. The type is `Send` but not `Sync`: move it to the
/// thread that uses it, or give each worker its own connection.
///
/// Methods documented as blocking hold the calling thread for the whole
/// exchange with the server.
pub struct Connection {
    native: RefCell<Option<Box<dyn NativeConnection>>>,
    logger: StructuredLogger,
    metrics: Metrics,
    endpoint: String,
}

impl Connection {
    /// Applies `options` in order, then performs the handshake. Blocking.
    pub fn connect(
        driver: &dyn NativeDriver,
        options: &ConnectOptions,
        target: &ConnectTarget,
    ) -> Result<Self> {
        let logger = StructuredLogger::default();
        let mut native = driver
            .init()
            .map_err(|err| MysqlError::rejected("Mysql.connect", err))?;

        for option in options.iter().filter(|o| o.client_flag().is_none()) {
            if let Err(err) = native.set_option(option) {
                native.close();
                let error = MysqlError::unknown_option(format_args!("{option} ({})", err.message));
                logger.log_error(&error);
                return Err(error);
            }
        }

        let endpoint = target.to_string();
        if let Err(err) = native.real_connect(target, options.client_flags()) {
            native.close();
            let error = MysqlError::rejected("", err);
            logger.log_error(&error);
            return Err(error);
        }
        logger.log_connection(Level::Info, &endpoint, "open");

        Ok(Self {
            native: RefCell::new(Some(native)),
            logger,
            metrics: Metrics::new(),
            endpoint,
        })
    }

    fn handle(&self, operation: &str) -> Result<RefMut<'_, Box<dyn NativeConnection>>> {
        let guard = self.native.try_borrow_mut().map_err(|_| {
            MysqlError::InternalError(format!("Mysql.{operation}: connection already in use"))
        })?;
        RefMut::filter_map(guard, Option::as_mut)
            .map_err(|_| MysqlError::closed_connection(operation))
    }

    /// Counts and logs a failure on its way to the caller.
    pub(crate) fn fail(&self, error: MysqlError) -> MysqlError {
        self.metrics.record_error();
        self.logger.log_error(&error);
        error
    }

    pub(crate) fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub(crate) fn metrics_handle(&self) -> &Metrics {
        &self.metrics
    }

    pub fn is_open(&self) -> bool {
        self.native
            .try_borrow()
            .map(|native| native.is_some())
            .unwrap_or(true)
    }

    /// `user@host:port/database` of the handshake; never includes the password.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Closes the session. A second call fails with `ClosedHandle`.
    pub fn disconnect(&self) -> Result<()> {
        let mut slot = self.native.try_borrow_mut().map_err(|_| {
            MysqlError::InternalError("Mysql.disconnect: connection already in use".to_string())
        })?;
        let mut native = slot
            .take()
            .ok_or_else(|| MysqlError::closed_connection("disconnect"))?;
        native.close();
        self.logger
            .log_connection(Level::Info, &self.endpoint, "close");
        Ok(())
    }

    /// Checks that the server is reachable. Blocking.
    ///
    /// Reconnects only when the `reconnect` option was set at connect time.
    pub fn ping(&self) -> Result<()> {
        self.handle("ping")?
            .ping()
            .map_err(|err| self.fail(MysqlError::rejected("Mysql.ping", err)))
    }

    /// Re-authenticates in place. Blocking.
    pub fn change_user(
        &self,
        user: Option<&str>,
        password: Option<&str>,
        database: Option<&str>,
    ) -> Result<()> {
        self.handle("change_user")?
            .change_user(user, password, database)
            .map_err(|err| self.fail(MysqlError::rejected("Mysql.change_user", err)))?;
        self.logger.log_connection(
            Level::Info,
            &self.endpoint,
            &format!("change_user {}", user.unwrap_or_default()),
        );
        Ok(())
    }

    /// Switches the default database. Blocking.
    pub fn select_db(&self, database: &str) -> Result<()> {
        self.handle("select_db")?
            .select_db(database)
            .map_err(|err| self.fail(MysqlError::rejected("Mysql.select_db", err)))
    }

    /// Sets the connection character set. Blocking.
    pub fn set_charset(&self, charset: &str) -> Result<()> {
        self.handle("set_charset")?
            .set_character_set(charset)
            .map_err(|err| self.fail(MysqlError::rejected("Mysql.set_charset", err)))
    }

    fn query(&self, operation: &str, sql: &str) -> Result<QueryResult<'_>> {
        let mut native = self.handle(operation)?;
        let started = Instant::now();
        let stored = native
            .real_query(sql.as_bytes())
            .and_then(|_| native.store_result())
            .map_err(|err| self.fail(MysqlError::rejected(format!("Mysql.{operation}"), err)))?;
        drop(native);

        let elapsed = started.elapsed();
        self.metrics.record_query(elapsed);
        let result = QueryResult::new(stored);
        self.logger.log_query(
            Level::Debug,
            "Query",
            sql,
            &[
                ("rows", result.row_count().to_string()),
                ("elapsed_us", elapsed.as_micros().to_string()),
            ],
        );
        Ok(result)
    }

    /// Runs `sql` and buffers its whole result in memory. Blocking.
    pub fn execute_query(&self, sql: &str) -> Result<QueryResult<'_>> {
        self.query("exec", sql)
    }

    /// Databases matching the `LIKE` wildcard `pattern`, `None` when nothing matches. Blocking.
    pub fn list_dbs(&self, pattern: Option<&str>) -> Result<Option<Vec<String>>> {
        let sql = match pattern {
            None => "SHOW DATABASES".to_string(),
            Some(pattern) => format!(
                "SHOW DATABASES LIKE '{}'",
                self.escape_for("list_dbs", pattern)?
            ),
        };
        let mut result = self.query("list_dbs", &sql)?;
        if !result.is_fetchable() || result.row_count() == 0 {
            return Ok(None);
        }
        let names = result
            .rows()
            .map(|row| row.map(|r| r.get(0).map(String::from_utf8_lossy).unwrap_or_default().into_owned()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(names))
    }

    /// Prepares `sql` on the server. Blocking.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        let mut native = self
            .handle("Prepared.create")?
            .stmt_init()
            .map_err(|err| self.fail(MysqlError::rejected("Mysql.Prepared.create", err)))?;

        if let Err(err) = native.prepare(sql.as_bytes()) {
            if let Err(close_err) = native.close() {
                self.logger
                    .log_release_failure("statement", &close_err.message);
            }
            return Err(self.fail(MysqlError::rejected_sql("Mysql.Prepared.create", err, sql)));
        }

        let param_count = native.param_count();
        self.metrics.record_prepare();
        self.logger.log_query(
            Level::Debug,
            "Prepare",
            sql,
            &[("params", param_count.to_string())],
        );
        Ok(Statement::new(self, native, sql, param_count))
    }

    fn escape_for(&self, operation: &str, input: &str) -> Result<String> {
        let escaped = self
            .handle(operation)?
            .real_escape(input.as_bytes())
            .map_err(|err| self.fail(MysqlError::rejected(format!("Mysql.{operation}"), err)))?;
        String::from_utf8(escaped)
            .map_err(|e| MysqlError::InternalError(format!("Mysql.{operation}: {e}")))
    }

    /// Escapes `input` for the connection's character set. Local, never blocks.
    pub fn real_escape(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.handle("real_escape")?
            .real_escape(input)
            .map_err(|err| self.fail(MysqlError::rejected("Mysql.real_escape", err)))
    }

    pub fn real_escape_str(&self, input: &str) -> Result<String> {
        self.escape_for("real_escape", input)
    }

    pub fn host_info(&self) -> Result<String> {
        Ok(self.handle("get_host_info")?.host_info())
    }

    pub fn server_info(&self) -> Result<String> {
        Ok(self.handle("get_server_info")?.server_info())
    }

    pub fn proto_info(&self) -> Result<u32> {
        Ok(self.handle("get_proto_info")?.proto_info())
    }

    /// Last native error code, 0 when the last call succeeded.
    pub fn status(&self) -> Result<u32> {
        Ok(self.handle("status")?.errno())
    }

    /// Last native error message, `None` when the last call succeeded.
    pub fn errmsg(&self) -> Result<Option<String>> {
        let message = self.handle("errmsg")?.error();
        Ok((!message.is_empty()).then_some(message))
    }

    pub fn affected_rows(&self) -> Result<u64> {
        Ok(self.handle("affected")?.affected_rows())
    }

    pub fn insert_id(&self) -> Result<u64> {
        Ok(self.handle("insert_id")?.insert_id())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(mut native) = self.native.get_mut().take() {
            native.close();
            self.logger
                .log_connection(Level::Debug, &self.endpoint, "released");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Version string of the client library behind `driver`.
pub fn client_info(driver: &dyn NativeDriver) -> String {
    driver.client_info()
}
