/// Prepared statement tests against the scripted driver.
use mysql_engine::native::codes;
use mysql_engine::native::scripted::{
    Execution, QueryOutcome, ScriptedDriver, ScriptedStatement, ScriptedTable,
};
use mysql_engine::native::NativeError;
use mysql_engine::{
    BindStage, ErrorCategory, FieldType, HandleKind, Mismatch, MysqlError, Row,
};

mod helpers;
use helpers::{connect, int_table, scripted_driver};

const INSERT: &str = "INSERT INTO t(a) VALUES (?)";
const SELECT_A: &str = "SELECT a FROM t";

fn assert_closed_statement<T: std::fmt::Debug>(result: Result<T, MysqlError>, operation: &str) {
    match result {
        Err(MysqlError::ClosedHandle { operation: op, handle }) => {
            assert_eq!(handle, HandleKind::Statement);
            assert_eq!(op, operation);
        }
        other => panic!("Expected closed statement for {operation}, got {other:?}"),
    }
}

#[test]
fn test_insert_null_then_select_it_back() {
    let driver = ScriptedDriver::new();
    driver.on_prepare(INSERT, ScriptedStatement::new(1).affecting(1, 0));
    driver.on_query(
        SELECT_A,
        QueryOutcome::Rows(
            ScriptedTable::new(&[("a", codes::TYPE_VAR_STRING)]).with_row([None::<&str>]),
        ),
    );
    let conn = connect(&driver);

    let mut stmt = conn.prepare(INSERT).unwrap();
    assert_eq!(stmt.param_count(), 1);
    let result = stmt.execute_null(&[None::<&str>]).unwrap();
    assert_eq!(result.column_count(), 0);
    drop(result);
    assert_eq!(stmt.affected_rows().unwrap(), 1);
    assert_eq!(
        driver.executions(),
        vec![Execution {
            sql: INSERT.to_string(),
            params: vec![None],
        }]
    );

    let mut rows = conn.execute_query(SELECT_A).unwrap();
    assert_eq!(rows.fetch().unwrap(), Some(Row::new(vec![None])));
}

#[test]
fn test_param_count_mismatch_never_reaches_server() {
    let driver = scripted_driver();
    driver.on_prepare("SELECT ?", ScriptedStatement::new(1));
    let conn = connect(&driver);
    let mut stmt = conn.prepare("SELECT ?").unwrap();
    driver.clear_calls();

    let err = stmt.execute(&["x", "y"]).unwrap_err();
    assert_eq!(
        err,
        MysqlError::ProtocolMismatch {
            context: "Mysql.Prepared.execute".to_string(),
            mismatch: Mismatch::ParamCount {
                got: 2,
                expected: 1
            },
        }
    );
    assert!(err.to_string().contains("got 2, expected 1"));
    assert_eq!(err.native_code(), 0);
    assert_eq!(err.error_category(), ErrorCategory::Validation);

    let err = stmt.execute_null::<&str>(&[]).unwrap_err();
    assert!(err.to_string().contains("got 0, expected 1"));

    assert!(driver.executions().is_empty());
    assert!(driver.calls().is_empty());
}

#[test]
fn test_param_count_mismatch_for_every_arity() {
    let driver = ScriptedDriver::new();
    for k in 0..4 {
        let sql = format!("SELECT {k} params");
        driver.on_prepare(&sql, ScriptedStatement::new(k));
    }
    let conn = connect(&driver);
    for k in 0..4usize {
        let mut stmt = conn.prepare(&format!("SELECT {k} params")).unwrap();
        for n in 0..6usize {
            let params: Vec<String> = (0..n).map(|i| i.to_string()).collect();
            let outcome = stmt.execute(&params);
            if n == k {
                assert!(outcome.is_ok());
            } else {
                assert!(matches!(
                    outcome,
                    Err(MysqlError::ProtocolMismatch {
                        mismatch: Mismatch::ParamCount { .. },
                        ..
                    })
                ));
            }
        }
    }
    assert_eq!(driver.executions().len(), 4);
}

#[test]
fn test_null_and_length_reporting() {
    let driver = ScriptedDriver::new();
    driver.on_prepare(
        "SELECT a, b, c FROM t WHERE id = ?",
        ScriptedStatement::new(1).returning(
            ScriptedTable::new(&[
                ("a", codes::TYPE_VAR_STRING),
                ("b", codes::TYPE_BLOB),
                ("c", codes::TYPE_VAR_STRING),
            ])
            .with_row([Some(&b"hello"[..]), None, Some(&b""[..])])
            .with_row([None, Some(&[0u8, 159, 146, 150][..]), Some(&b"z"[..])]),
        ),
    );
    let conn = connect(&driver);
    let mut stmt = conn.prepare("SELECT a, b, c FROM t WHERE id = ?").unwrap();
    let mut result = stmt.execute(&["7"]).unwrap();
    assert_eq!(result.column_count(), 3);

    let first = result.fetch().unwrap().unwrap();
    assert_eq!(first.get(0), Some(&b"hello"[..]));
    assert!(first.is_null(1));
    assert_eq!(first.get(2), Some(&b""[..]));
    assert!(!first.is_null(2));
    assert_eq!(result.is_null(1), Some(true));
    assert_eq!(result.length(0), Some(5));
    assert_eq!(result.length(2), Some(0));
    assert_eq!(result.truncated(0), Some(true));
    assert_eq!(result.is_null(3), None);

    let second = result.fetch().unwrap().unwrap();
    for (index, value) in second.values().iter().enumerate() {
        match value {
            None => assert_eq!(result.is_null(index), Some(true)),
            Some(bytes) => assert_eq!(Some(bytes.len() as u64), result.length(index)),
        }
    }
    assert_eq!(second.get(1), Some(&[0u8, 159, 146, 150][..]));

    assert_eq!(result.fetch().unwrap(), None);
}

#[test]
fn test_fetch_error_is_end_of_rows_by_default() {
    let driver = ScriptedDriver::new();
    driver.on_prepare(
        "SELECT n FROM t",
        ScriptedStatement::new(0)
            .returning(int_table(5))
            .failing_fetch_at(2),
    );
    let conn = connect(&driver);
    let mut stmt = conn.prepare("SELECT n FROM t").unwrap();
    assert!(!stmt.strict_fetch());

    let mut result = stmt.execute::<&str>(&[]).unwrap();
    let rows: Vec<Row> = result.rows().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_strict_fetch_surfaces_native_error() {
    let driver = ScriptedDriver::new();
    driver.on_prepare(
        "SELECT n FROM t",
        ScriptedStatement::new(0)
            .returning(int_table(5))
            .failing_fetch_at(2),
    );
    let conn = connect(&driver);
    let mut stmt = conn.prepare("SELECT n FROM t").unwrap();
    stmt.set_strict_fetch(true);

    let mut result = stmt.execute::<&str>(&[]).unwrap();
    assert!(result.fetch().unwrap().is_some());
    assert!(result.fetch().unwrap().is_some());
    let err = result.fetch().unwrap_err();
    assert_eq!(err.native_code(), codes::CR_SERVER_LOST);
    assert!(err.is_connection_error());
}

#[test]
fn test_zero_column_fetch_modes() {
    let driver = ScriptedDriver::new();
    driver.on_prepare("DELETE FROM t", ScriptedStatement::new(0).affecting(4, 0));
    let conn = connect(&driver);
    let mut stmt = conn.prepare("DELETE FROM t").unwrap();

    let mut result = stmt.execute::<&str>(&[]).unwrap();
    assert_eq!(result.fetch().unwrap(), None);
    assert_eq!(result.affected_rows().unwrap(), 4);
    drop(result);

    stmt.set_strict_fetch(true);
    let mut result = stmt.execute::<&str>(&[]).unwrap();
    assert!(matches!(
        result.fetch(),
        Err(MysqlError::NoFetchableData(_))
    ));
}

#[test]
fn test_reexecute_supersedes_previous_result() {
    let driver = ScriptedDriver::new();
    driver.on_prepare(
        "SELECT n FROM t WHERE n < ?",
        ScriptedStatement::new(1).returning(int_table(3)),
    );
    let conn = connect(&driver);
    let mut stmt = conn.prepare("SELECT n FROM t WHERE n < ?").unwrap();

    let mut first = stmt.execute(&["3"]).unwrap();
    assert_eq!(first.fetch().unwrap().unwrap().get_str(0), Some("0"));

    let mut second = stmt.execute(&["3"]).unwrap();
    let all: Vec<Row> = second.rows().collect::<Result<_, _>>().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(driver.executions().len(), 2);
}

#[test]
fn test_prepare_failure_releases_handle_and_names_sql() {
    let driver = scripted_driver();
    let conn = connect(&driver);

    let err = conn.prepare("SELEKT nope").unwrap_err();
    assert_eq!(err.native_code(), codes::ER_PARSE_ERROR);
    let text = err.to_string();
    assert!(text.starts_with("Mysql.Prepared.create: Query : SELEKT nope. Error : "));
    assert_eq!(driver.live_statements(), 0);
    assert_eq!(driver.double_releases(), 0);

    driver.on_prepare(
        "SELECT * FROM locked",
        ScriptedStatement::new(0).failing_prepare(
            NativeError::new(codes::ER_LOCK_WAIT_TIMEOUT, "Lock wait timeout exceeded"),
        ),
    );
    let err = conn.prepare("SELECT * FROM locked").unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(driver.live_statements(), 0);
}

#[test]
fn test_execute_and_bind_failures() {
    let driver = ScriptedDriver::new();
    driver.on_prepare(
        "INSERT INTO u VALUES (?)",
        ScriptedStatement::new(1).failing_execute(
            NativeError::new(1062, "Duplicate entry '1' for key 'PRIMARY'")
                .with_sqlstate(*b"23000"),
        ),
    );
    driver.on_prepare(
        "INSERT INTO v VALUES (?)",
        ScriptedStatement::new(1)
            .failing_bind(NativeError::new(codes::CR_PARAMS_NOT_BOUND, "No data supplied")),
    );
    let conn = connect(&driver);

    let mut stmt = conn.prepare("INSERT INTO u VALUES (?)").unwrap();
    let err = stmt.execute(&["1"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Mysql.Prepared.execute: Duplicate entry '1' for key 'PRIMARY'"
    );
    assert_eq!(stmt.status().unwrap(), 1062);
    assert_eq!(
        stmt.error().unwrap().as_deref(),
        Some("Duplicate entry '1' for key 'PRIMARY'")
    );

    let mut stmt = conn.prepare("INSERT INTO v VALUES (?)").unwrap();
    let err = stmt.execute(&["1"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "Mysql.Prepared.execute: mysql_stmt_bind_param = {}",
            codes::CR_PARAMS_NOT_BOUND
        )
    );
    assert!(matches!(
        err,
        MysqlError::ProtocolMismatch {
            mismatch: Mismatch::Bind {
                stage: BindStage::Params,
                ..
            },
            ..
        }
    ));
    assert_eq!(err.native_code(), codes::CR_PARAMS_NOT_BOUND);
    assert_eq!(err.error_category(), ErrorCategory::Fatal);
}

#[test]
fn test_operations_after_close() {
    let driver = scripted_driver();
    driver.on_prepare("SELECT ?", ScriptedStatement::new(1));
    let conn = connect(&driver);
    let mut stmt = conn.prepare("SELECT ?").unwrap();
    stmt.close().unwrap();
    assert!(stmt.is_closed());
    assert_eq!(driver.live_statements(), 0);

    assert_closed_statement(stmt.execute(&["x"]), "Mysql.Prepared.execute");
    assert_closed_statement(
        stmt.execute_null(&[Some("x")]),
        "Mysql.Prepared.execute",
    );
    assert_closed_statement(stmt.affected_rows(), "Mysql.Prepared.affected");
    assert_closed_statement(stmt.insert_id(), "Mysql.Prepared.insert_id");
    assert_closed_statement(stmt.status(), "Mysql.Prepared.status");
    assert_closed_statement(stmt.result_metadata(), "Mysql.Prepared.result_metadata");
    assert_closed_statement(stmt.close(), "Mysql.Prepared.close");
    assert_eq!(
        stmt.execute(&["x"]).unwrap_err().to_string(),
        "Mysql.Prepared.execute called with closed statement"
    );

    drop(stmt);
    assert_eq!(driver.double_releases(), 0);
}

#[test]
fn test_close_failure_is_swallowed() {
    let driver = scripted_driver();
    driver.on_prepare("SELECT 1", ScriptedStatement::new(0));
    driver.fail_statement_close();
    let conn = connect(&driver);

    let mut stmt = conn.prepare("SELECT 1").unwrap();
    assert!(stmt.close().is_ok());

    let implicit = conn.prepare("SELECT 1").unwrap();
    drop(implicit);
    assert_eq!(driver.live_statements(), 0);
    assert_eq!(driver.double_releases(), 0);
}

#[test]
fn test_statement_after_disconnect_is_closed_connection() {
    let driver = scripted_driver();
    driver.on_prepare("SELECT ?", ScriptedStatement::new(1));
    let conn = connect(&driver);
    let mut stmt = conn.prepare("SELECT ?").unwrap();
    conn.disconnect().unwrap();

    match stmt.execute(&["x"]) {
        Err(MysqlError::ClosedHandle { handle, operation }) => {
            assert_eq!(handle, HandleKind::Connection);
            assert_eq!(operation, "Mysql.Prepared.execute");
        }
        other => panic!("Expected ClosedHandle, got {other:?}"),
    }
    assert!(stmt.close().is_ok());
}

#[test]
fn test_result_metadata_without_execute() {
    let driver = ScriptedDriver::new();
    driver.on_prepare(
        "SELECT id, name FROM users WHERE id = ?",
        ScriptedStatement::new(1).returning(ScriptedTable::new(&[
            ("id", codes::TYPE_LONGLONG),
            ("name", codes::TYPE_VAR_STRING),
        ])),
    );
    driver.on_prepare("DO ?", ScriptedStatement::new(1));
    let conn = connect(&driver);

    let mut stmt = conn.prepare("SELECT id, name FROM users WHERE id = ?").unwrap();
    let metadata = stmt.result_metadata().unwrap();
    let fields = metadata.fields().unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].field_type, FieldType::Int64);
    assert_eq!(fields[1].name, "name");
    assert!(driver.executions().is_empty());
    drop(metadata);

    let mut no_rows = conn.prepare("DO ?").unwrap();
    let metadata = no_rows.result_metadata().unwrap();
    assert!(metadata.fields().is_none());
    assert_eq!(driver.live_results(), 0);
}

#[test]
fn test_execute_copies_parameter_bytes() {
    let driver = ScriptedDriver::new();
    driver.on_prepare(
        "INSERT INTO t(a, b) VALUES (?, ?)",
        ScriptedStatement::new(2).affecting(1, 17),
    );
    let conn = connect(&driver);
    let mut stmt = conn.prepare("INSERT INTO t(a, b) VALUES (?, ?)").unwrap();

    let mut owned = vec![b"it's".to_vec(), Vec::new()];
    stmt.execute(&owned).unwrap();
    owned[0].clear();
    assert_eq!(stmt.insert_id().unwrap(), 17);
    assert_eq!(
        driver.executions()[0].params,
        vec![Some(b"it's".to_vec()), Some(Vec::new())]
    );
    assert_eq!(conn.metrics().executes, 1);
    assert_eq!(conn.metrics().prepares, 1);
}
