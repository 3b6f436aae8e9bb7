//! In-process driver answering from registered fixtures.
//!
//! Queries and prepared statements are matched by exact SQL text. Every call
//! that would reach a server is appended to a call log, and handle
//! allocations are counted, so tests can assert both what was sent and that
//! every handle was released exactly once.

use super::{
    codes, ColumnSlot, ExecuteError, FetchStatus, InputBind, NativeConnection, NativeDriver,
    NativeError, NativeField, NativeResult, NativeResultSet, NativeStatement,
};
use crate::config::{ConnectOption, ConnectTarget};
use crate::escape;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const SERVER_VERSION: &str = "8.0.36-scripted";
const CLIENT_VERSION: &str = "8.0.36";
const PROTOCOL_VERSION: u32 = 10;
const KNOWN_CHARSETS: [&str; 5] = ["utf8mb4", "utf8mb3", "utf8", "latin1", "binary"];

pub type ScriptedRow = Vec<Option<Vec<u8>>>;

/// A canned result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedTable {
    pub fields: Vec<NativeField>,
    pub rows: Vec<ScriptedRow>,
}

impl ScriptedTable {
    /// Columns given as `(name, native type code)`.
    pub fn new(columns: &[(&str, u32)]) -> Self {
        let fields = columns
            .iter()
            .map(|(name, type_code)| NativeField {
                name: (*name).to_string(),
                type_code: *type_code,
                ..NativeField::default()
            })
            .collect();
        Self {
            fields,
            rows: Vec::new(),
        }
    }

    pub fn from_fields(fields: Vec<NativeField>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
        }
    }

    pub fn with_row<I, V>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = Option<V>>,
        V: AsRef<[u8]>,
    {
        self.rows
            .push(row.into_iter().map(|v| v.map(|v| v.as_ref().to_vec())).collect());
        self
    }

    /// Sets each field's `max_length` to its longest value, as a buffered result does.
    fn with_max_lengths(mut self) -> Self {
        for (index, field) in self.fields.iter_mut().enumerate() {
            field.max_length = self
                .rows
                .iter()
                .filter_map(|row| row.get(index).and_then(|v| v.as_ref()))
                .map(|v| v.len() as u64)
                .max()
                .unwrap_or(0);
        }
        self
    }
}

/// What the scripted server answers to a text query.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Rows(ScriptedTable),
    Affected { rows: u64, insert_id: u64 },
    Fail(NativeError),
    /// The query is accepted but buffering its rows fails.
    StoreFails(NativeError),
}

/// A canned prepared statement.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStatement {
    pub param_count: usize,
    pub result: Option<ScriptedTable>,
    pub affected_rows: u64,
    pub insert_id: u64,
    pub prepare_error: Option<NativeError>,
    pub bind_error: Option<NativeError>,
    pub execute_error: Option<NativeError>,
    /// Fetch fails with a lost-connection error when the cursor reaches this row.
    pub fetch_error_at: Option<usize>,
}

impl ScriptedStatement {
    pub fn new(param_count: usize) -> Self {
        Self {
            param_count,
            ..Self::default()
        }
    }

    pub fn returning(mut self, table: ScriptedTable) -> Self {
        self.result = Some(table);
        self
    }

    pub fn affecting(mut self, rows: u64, insert_id: u64) -> Self {
        self.affected_rows = rows;
        self.insert_id = insert_id;
        self
    }

    pub fn failing_prepare(mut self, err: NativeError) -> Self {
        self.prepare_error = Some(err);
        self
    }

    pub fn failing_bind(mut self, err: NativeError) -> Self {
        self.bind_error = Some(err);
        self
    }

    pub fn failing_execute(mut self, err: NativeError) -> Self {
        self.execute_error = Some(err);
        self
    }

    pub fn failing_fetch_at(mut self, row: usize) -> Self {
        self.fetch_error_at = Some(row);
        self
    }
}

/// Parameters received by one statement execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub sql: String,
    pub params: Vec<Option<Vec<u8>>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    queries: HashMap<String, QueryOutcome>,
    statements: HashMap<String, ScriptedStatement>,
    databases: Vec<String>,
    rejected_users: HashSet<String>,
    rejected_options: HashSet<&'static str>,
    connect_error: Option<NativeError>,
    fail_statement_close: bool,
    link_down: bool,
    client_flags: u64,
    charset: String,
    calls: Vec<String>,
    executions: Vec<Execution>,
    live_connections: usize,
    live_results: usize,
    live_statements: usize,
    double_releases: usize,
}

/// Fixture-driven implementation of [`NativeDriver`]. Clones share state.
#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedDriver {
    pub fn new() -> Self {
        let state = ScriptState {
            databases: vec!["information_schema".to_string(), "testdb".to_string()],
            charset: "utf8mb4".to_string(),
            ..ScriptState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        lock(&self.state)
    }

    pub fn on_query(&self, sql: &str, outcome: QueryOutcome) -> &Self {
        self.state().queries.insert(sql.to_string(), outcome);
        self
    }

    pub fn on_prepare(&self, sql: &str, statement: ScriptedStatement) -> &Self {
        self.state().statements.insert(sql.to_string(), statement);
        self
    }

    pub fn add_database(&self, name: &str) -> &Self {
        self.state().databases.push(name.to_string());
        self
    }

    pub fn reject_connect(&self, err: NativeError) -> &Self {
        self.state().connect_error = Some(err);
        self
    }

    pub fn reject_user(&self, user: &str) -> &Self {
        self.state().rejected_users.insert(user.to_string());
        self
    }

    /// Makes `set_option` fail for the option with this name.
    pub fn reject_option(&self, name: &'static str) -> &Self {
        self.state().rejected_options.insert(name);
        self
    }

    /// Makes every native statement close report failure.
    pub fn fail_statement_close(&self) -> &Self {
        self.state().fail_statement_close = true;
        self
    }

    /// Simulates the server dropping every link.
    pub fn drop_link(&self) {
        self.state().link_down = true;
    }

    pub fn restore_link(&self) {
        self.state().link_down = false;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.state().executions.clone()
    }

    pub fn live_connections(&self) -> usize {
        self.state().live_connections
    }

    pub fn live_results(&self) -> usize {
        self.state().live_results
    }

    pub fn live_statements(&self) -> usize {
        self.state().live_statements
    }

    /// Capability flags passed to the last handshake.
    pub fn client_flags(&self) -> u64 {
        self.state().client_flags
    }

    /// Character set of the most recent connection.
    pub fn charset(&self) -> String {
        self.state().charset.clone()
    }

    /// Releases of a handle that was already released.
    pub fn double_releases(&self) -> usize {
        self.state().double_releases
    }
}

impl NativeDriver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn init(&self) -> NativeResult<Box<dyn NativeConnection>> {
        self.state().live_connections += 1;
        Ok(Box::new(ScriptedConnection {
            state: Arc::clone(&self.state),
            reconnect: false,
            closed: false,
            via_socket: false,
            last_error: None,
            affected_rows: 0,
            insert_id: 0,
            pending: None,
            store_error: None,
        }))
    }

    fn client_info(&self) -> String {
        CLIENT_VERSION.to_string()
    }
}

fn syntax_error(sql: &str) -> NativeError {
    let near: String = sql.chars().take(40).collect();
    NativeError::new(
        codes::ER_PARSE_ERROR,
        format!("You have an error in your SQL syntax; check the manual near '{near}'"),
    )
    .with_sqlstate(*b"42000")
}

fn server_gone() -> NativeError {
    NativeError::new(codes::CR_SERVER_GONE_ERROR, "MySQL server has gone away")
        .with_sqlstate(*b"08S01")
}

/// SQL `LIKE` matching with `%` and `_`.
fn like(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'%', rest)) => (0..=text.len()).any(|skip| like(rest, &text[skip..])),
        Some((b'_', rest)) => !text.is_empty() && like(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && like(rest, &text[1..]),
    }
}

struct ScriptedConnection {
    state: Arc<Mutex<ScriptState>>,
    reconnect: bool,
    closed: bool,
    via_socket: bool,
    last_error: Option<NativeError>,
    affected_rows: u64,
    insert_id: u64,
    pending: Option<ScriptedTable>,
    store_error: Option<NativeError>,
}

impl ScriptedConnection {
    fn record(&self, call: String) -> MutexGuard<'_, ScriptState> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        state
    }

    /// Checks the link, reconnecting when the option allows it.
    fn ensure_link(&self, state: &mut ScriptState) -> NativeResult<()> {
        if !state.link_down {
            return Ok(());
        }
        if self.reconnect {
            state.link_down = false;
            state.calls.push("reconnect".to_string());
            return Ok(());
        }
        Err(server_gone())
    }

    fn finish<T>(&mut self, result: NativeResult<T>) -> NativeResult<T> {
        self.last_error = result.as_ref().err().cloned();
        result
    }

    fn show_databases(&self, sql: &str, state: &ScriptState) -> Option<ScriptedTable> {
        let upper = sql.to_ascii_uppercase();
        if !upper.starts_with("SHOW DATABASES") {
            return None;
        }
        let pattern = sql
            .find('\'')
            .and_then(|start| {
                sql.rfind('\'')
                    .filter(|end| *end > start)
                    .map(|end| &sql[start + 1..end])
            })
            .map(|escaped| escape::unescape(escaped.as_bytes()).unwrap_or_default());
        let mut table = ScriptedTable::new(&[("Database", codes::TYPE_VAR_STRING)]);
        for name in &state.databases {
            if pattern
                .as_deref()
                .map_or(true, |p| like(p, name.as_bytes()))
            {
                table = table.with_row([Some(name.as_bytes())]);
            }
        }
        Some(table)
    }
}

impl NativeConnection for ScriptedConnection {
    fn set_option(&mut self, option: &ConnectOption) -> NativeResult<()> {
        let mut state = self.record(format!("set_option {}", option.name()));
        if state.rejected_options.contains(option.name()) {
            return Err(NativeError::new(
                codes::CR_UNKNOWN_ERROR,
                format!("option {} not supported", option.name()),
            ));
        }
        if let ConnectOption::SetCharsetName(name) = option {
            state.charset = name.clone();
        }
        drop(state);
        if let ConnectOption::Reconnect(enabled) = option {
            self.reconnect = *enabled;
        }
        Ok(())
    }

    fn real_connect(&mut self, target: &ConnectTarget, client_flags: u64) -> NativeResult<()> {
        let mut state = self.record(format!("connect {target}"));
        let result = if let Some(err) = state.connect_error.clone() {
            Err(err)
        } else if let Some(user) = target.user.as_ref().filter(|u| state.rejected_users.contains(*u))
        {
            Err(NativeError::new(
                codes::ER_ACCESS_DENIED_ERROR,
                format!("Access denied for user '{user}'@'localhost' (using password: YES)"),
            )
            .with_sqlstate(*b"28000"))
        } else if let Some(db) = target
            .database
            .as_ref()
            .filter(|db| !state.databases.contains(*db))
        {
            Err(NativeError::new(codes::ER_BAD_DB_ERROR, format!("Unknown database '{db}'"))
                .with_sqlstate(*b"42000"))
        } else {
            state.client_flags = client_flags;
            Ok(())
        };
        drop(state);
        if result.is_ok() {
            self.via_socket = target.socket.is_some();
        }
        self.finish(result)
    }

    fn close(&mut self) {
        let state_arc = Arc::clone(&self.state);
        let mut state = lock(&state_arc);
        state.calls.push("close".to_string());
        if self.closed {
            state.double_releases += 1;
            return;
        }
        self.closed = true;
        state.live_connections -= 1;
    }

    fn ping(&mut self) -> NativeResult<()> {
        let state_arc = Arc::clone(&self.state);
        let mut state = lock(&state_arc);
        state.calls.push("ping".to_string());
        let result = self.ensure_link(&mut state);
        drop(state);
        self.finish(result)
    }

    fn change_user(
        &mut self,
        user: Option<&str>,
        _password: Option<&str>,
        database: Option<&str>,
    ) -> NativeResult<()> {
        let state_arc = Arc::clone(&self.state);
        let mut state = lock(&state_arc);
        state
            .calls
            .push(format!("change_user {}", user.unwrap_or_default()));
        let mut result = self.ensure_link(&mut state);
        if result.is_ok() {
            if let Some(user) = user.filter(|u| state.rejected_users.contains(*u)) {
                result = Err(NativeError::new(
                    codes::ER_ACCESS_DENIED_ERROR,
                    format!("Access denied for user '{user}'@'localhost' (using password: YES)"),
                )
                .with_sqlstate(*b"28000"));
            } else if let Some(db) = database.filter(|db| !state.databases.iter().any(|d| d == db))
            {
                result = Err(NativeError::new(
                    codes::ER_BAD_DB_ERROR,
                    format!("Unknown database '{db}'"),
                ));
            }
        }
        drop(state);
        self.finish(result)
    }

    fn select_db(&mut self, database: &str) -> NativeResult<()> {
        let state_arc = Arc::clone(&self.state);
        let mut state = lock(&state_arc);
        state.calls.push(format!("select_db {database}"));
        let result = self.ensure_link(&mut state).and_then(|_| {
            if state.databases.iter().any(|d| d == database) {
                Ok(())
            } else {
                Err(NativeError::new(
                    codes::ER_BAD_DB_ERROR,
                    format!("Unknown database '{database}'"),
                )
                .with_sqlstate(*b"42000"))
            }
        });
        drop(state);
        self.finish(result)
    }

    fn real_query(&mut self, sql: &[u8]) -> NativeResult<()> {
        let sql = String::from_utf8_lossy(sql).into_owned();
        let state_arc = Arc::clone(&self.state);
        let mut state = lock(&state_arc);
        state.calls.push(format!("query {sql}"));
        self.pending = None;
        self.store_error = None;
        let result = self.ensure_link(&mut state).and_then(|_| {
            let outcome = match state.queries.get(&sql) {
                Some(outcome) => outcome.clone(),
                None => match self.show_databases(&sql, &state) {
                    Some(table) => QueryOutcome::Rows(table),
                    None => return Err(syntax_error(&sql)),
                },
            };
            match outcome {
                QueryOutcome::Rows(table) => {
                    self.affected_rows = table.rows.len() as u64;
                    self.insert_id = 0;
                    self.pending = Some(table);
                    Ok(())
                }
                QueryOutcome::Affected { rows, insert_id } => {
                    self.affected_rows = rows;
                    self.insert_id = insert_id;
                    Ok(())
                }
                QueryOutcome::Fail(err) => Err(err),
                QueryOutcome::StoreFails(err) => {
                    self.affected_rows = 0;
                    self.insert_id = 0;
                    self.store_error = Some(err);
                    Ok(())
                }
            }
        });
        drop(state);
        self.finish(result)
    }

    fn store_result(&mut self) -> NativeResult<Option<Box<dyn NativeResultSet>>> {
        if let Some(err) = self.store_error.take() {
            return self.finish(Err(err));
        }
        let Some(table) = self.pending.take() else {
            return Ok(None);
        };
        lock(&self.state).live_results += 1;
        Ok(Some(Box::new(ScriptedResultSet::new(
            table.with_max_lengths(),
            Arc::clone(&self.state),
        ))))
    }

    fn real_escape(&self, input: &[u8]) -> NativeResult<Vec<u8>> {
        Ok(escape::escape(input))
    }

    fn set_character_set(&mut self, charset: &str) -> NativeResult<()> {
        let state_arc = Arc::clone(&self.state);
        let mut state = lock(&state_arc);
        state.calls.push(format!("set_charset {charset}"));
        let result = self.ensure_link(&mut state).and_then(|_| {
            if KNOWN_CHARSETS.contains(&charset) {
                Ok(())
            } else {
                Err(NativeError::new(
                    codes::CR_CANT_READ_CHARSET,
                    format!("Can't initialize character set {charset}"),
                ))
            }
        });
        if result.is_ok() {
            state.charset = charset.to_string();
        }
        drop(state);
        self.finish(result)
    }

    fn host_info(&self) -> String {
        if self.via_socket {
            "Localhost via UNIX socket".to_string()
        } else {
            "127.0.0.1 via TCP/IP".to_string()
        }
    }

    fn server_info(&self) -> String {
        SERVER_VERSION.to_string()
    }

    fn proto_info(&self) -> u32 {
        PROTOCOL_VERSION
    }

    fn errno(&self) -> u32 {
        self.last_error.as_ref().map_or(0, |e| e.code)
    }

    fn error(&self) -> String {
        self.last_error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_default()
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn insert_id(&self) -> u64 {
        self.insert_id
    }

    fn stmt_init(&mut self) -> NativeResult<Box<dyn NativeStatement>> {
        let mut state = self.record("stmt_init".to_string());
        state.live_statements += 1;
        drop(state);
        Ok(Box::new(ScriptedStmt {
            state: Arc::clone(&self.state),
            sql: String::new(),
            fixture: None,
            executed: false,
            cursor: 0,
            current: None,
            bound_columns: 0,
            last_error: None,
            closed: false,
        }))
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            lock(&self.state).live_connections -= 1;
        }
    }
}

struct ScriptedResultSet {
    state: Arc<Mutex<ScriptState>>,
    table: ScriptedTable,
    cursor: usize,
    field_cursor: usize,
}

impl ScriptedResultSet {
    fn new(table: ScriptedTable, state: Arc<Mutex<ScriptState>>) -> Self {
        Self {
            state,
            table,
            cursor: 0,
            field_cursor: 0,
        }
    }
}

impl NativeResultSet for ScriptedResultSet {
    fn num_rows(&self) -> u64 {
        self.table.rows.len() as u64
    }

    fn num_fields(&self) -> usize {
        self.table.fields.len()
    }

    fn fetch_row(&mut self) -> Option<Vec<Option<&[u8]>>> {
        let row = self.table.rows.get(self.cursor)?;
        self.cursor += 1;
        Some(row.iter().map(|v| v.as_deref()).collect())
    }

    fn data_seek(&mut self, offset: u64) {
        self.cursor = usize::try_from(offset).unwrap_or(usize::MAX);
    }

    fn fetch_field(&mut self) -> Option<NativeField> {
        let field = self.table.fields.get(self.field_cursor)?.clone();
        self.field_cursor += 1;
        Some(field)
    }

    fn fetch_field_direct(&self, index: usize) -> Option<NativeField> {
        self.table.fields.get(index).cloned()
    }

    fn fetch_fields(&self) -> Vec<NativeField> {
        self.table.fields.clone()
    }
}

impl Drop for ScriptedResultSet {
    fn drop(&mut self) {
        lock(&self.state).live_results -= 1;
    }
}

struct ScriptedStmt {
    state: Arc<Mutex<ScriptState>>,
    sql: String,
    fixture: Option<ScriptedStatement>,
    executed: bool,
    cursor: usize,
    current: Option<usize>,
    bound_columns: usize,
    last_error: Option<NativeError>,
    closed: bool,
}

impl ScriptedStmt {
    fn result_table(&self) -> Option<&ScriptedTable> {
        self.fixture.as_ref().and_then(|f| f.result.as_ref())
    }

    fn fail(&mut self, err: NativeError) -> NativeError {
        self.last_error = Some(err.clone());
        err
    }

    fn release(&mut self) {
        let mut state = lock(&self.state);
        if self.closed {
            state.double_releases += 1;
            return;
        }
        self.closed = true;
        state.live_statements -= 1;
    }
}

impl NativeStatement for ScriptedStmt {
    fn prepare(&mut self, sql: &[u8]) -> NativeResult<()> {
        let sql = String::from_utf8_lossy(sql).into_owned();
        let mut state = lock(&self.state);
        state.calls.push(format!("prepare {sql}"));
        if state.link_down {
            drop(state);
            return Err(self.fail(server_gone()));
        }
        let fixture = state.statements.get(&sql).cloned();
        drop(state);
        match fixture {
            None => Err(self.fail(syntax_error(&sql))),
            Some(ScriptedStatement {
                prepare_error: Some(err),
                ..
            }) => Err(self.fail(err)),
            Some(fixture) => {
                self.sql = sql;
                self.fixture = Some(fixture);
                self.last_error = None;
                Ok(())
            }
        }
    }

    fn param_count(&self) -> usize {
        self.fixture.as_ref().map_or(0, |f| f.param_count)
    }

    fn field_count(&self) -> usize {
        self.result_table().map_or(0, |t| t.fields.len())
    }

    fn execute(&mut self, params: &[InputBind<'_>]) -> Result<(), ExecuteError> {
        let Some(fixture) = self.fixture.clone() else {
            let err = NativeError::new(
                codes::CR_NO_PREPARE_STMT,
                "Statement not prepared",
            );
            return Err(ExecuteError::Execute(self.fail(err)));
        };
        let mut state = lock(&self.state);
        state.calls.push(format!("execute {}", self.sql));
        if let Some(err) = fixture.bind_error {
            drop(state);
            return Err(ExecuteError::Bind(self.fail(err)));
        }
        state.executions.push(Execution {
            sql: self.sql.clone(),
            params: params
                .iter()
                .map(|p| match p {
                    InputBind::Null => None,
                    InputBind::String(bytes) => Some(bytes.to_vec()),
                })
                .collect(),
        });
        let link_down = state.link_down;
        drop(state);
        if link_down {
            return Err(ExecuteError::Execute(self.fail(server_gone())));
        }
        if let Some(err) = fixture.execute_error {
            return Err(ExecuteError::Execute(self.fail(err)));
        }
        self.executed = true;
        self.cursor = 0;
        self.current = None;
        self.bound_columns = 0;
        self.last_error = None;
        Ok(())
    }

    fn bind_result(&mut self, columns: usize) -> NativeResult<()> {
        if columns != self.field_count() {
            let err = NativeError::new(
                codes::CR_UNKNOWN_ERROR,
                format!(
                    "bind_result: {columns} bindings for {} columns",
                    self.field_count()
                ),
            );
            return Err(self.fail(err));
        }
        self.bound_columns = columns;
        Ok(())
    }

    fn fetch(&mut self, slots: &mut [ColumnSlot]) -> FetchStatus {
        lock(&self.state).calls.push(format!("fetch {}", self.sql));
        if !self.executed {
            let err = NativeError::new(codes::CR_NO_DATA, "Attempt to read a row while there is no result set associated with the statement");
            return FetchStatus::Error(self.fail(err));
        }
        let fetch_error_at = self.fixture.as_ref().and_then(|f| f.fetch_error_at);
        if fetch_error_at == Some(self.cursor) {
            let err = NativeError::new(
                codes::CR_SERVER_LOST,
                "Lost connection to MySQL server during query",
            );
            return FetchStatus::Error(self.fail(err));
        }
        let Some(row) = self.result_table().and_then(|t| t.rows.get(self.cursor)) else {
            self.current = None;
            return FetchStatus::NoData;
        };
        let mut truncated = false;
        for (slot, value) in slots.iter_mut().zip(row) {
            *slot = match value {
                None => ColumnSlot {
                    is_null: true,
                    length: 0,
                    truncated: false,
                },
                Some(bytes) => ColumnSlot {
                    is_null: false,
                    length: bytes.len() as u64,
                    truncated: !bytes.is_empty(),
                },
            };
            truncated |= slot.truncated;
        }
        self.current = Some(self.cursor);
        self.cursor += 1;
        if truncated {
            FetchStatus::Truncated
        } else {
            FetchStatus::Row
        }
    }

    fn fetch_column(&mut self, index: usize, buffer: &mut [u8]) -> NativeResult<()> {
        let value = self
            .current
            .and_then(|row| self.result_table()?.rows.get(row)?.get(index).cloned());
        match value {
            Some(Some(bytes)) => {
                let n = buffer.len().min(bytes.len());
                buffer[..n].copy_from_slice(&bytes[..n]);
                Ok(())
            }
            Some(None) => Ok(()),
            None => {
                let err = NativeError::new(
                    codes::CR_NO_DATA,
                    format!("No data for column {index}"),
                );
                Err(self.fail(err))
            }
        }
    }

    fn affected_rows(&self) -> u64 {
        match (&self.fixture, self.executed) {
            (Some(fixture), true) => match &fixture.result {
                Some(table) => table.rows.len() as u64,
                None => fixture.affected_rows,
            },
            _ => 0,
        }
    }

    fn insert_id(&self) -> u64 {
        match (&self.fixture, self.executed) {
            (Some(fixture), true) => fixture.insert_id,
            _ => 0,
        }
    }

    fn errno(&self) -> u32 {
        self.last_error.as_ref().map_or(0, |e| e.code)
    }

    fn error(&self) -> String {
        self.last_error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_default()
    }

    fn result_metadata(&mut self) -> Option<Box<dyn NativeResultSet>> {
        let fields = self.result_table()?.fields.clone();
        lock(&self.state).live_results += 1;
        Some(Box::new(ScriptedResultSet::new(
            ScriptedTable::from_fields(fields),
            Arc::clone(&self.state),
        )))
    }

    fn close(&mut self) -> NativeResult<()> {
        lock(&self.state).calls.push(format!("stmt_close {}", self.sql));
        let fail = lock(&self.state).fail_statement_close;
        self.release();
        if fail {
            return Err(server_gone());
        }
        Ok(())
    }
}

impl Drop for ScriptedStmt {
    fn drop(&mut self) {
        if !self.closed {
            self.release();
        }
    }
}
