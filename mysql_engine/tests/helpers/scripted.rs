//! Fixtures shared by the tests that run against the scripted driver.

use mysql_engine::native::codes;
use mysql_engine::native::scripted::{ScriptedDriver, ScriptedTable};
use mysql_engine::{ConnectOptions, ConnectTarget, Connection};

/// A driver with `SELECT 1` registered.
#[allow(dead_code)]
pub fn scripted_driver() -> ScriptedDriver {
    let _ = env_logger::builder().is_test(true).try_init();
    let driver = ScriptedDriver::new();
    driver.on_query(
        "SELECT 1",
        mysql_engine::native::scripted::QueryOutcome::Rows(
            ScriptedTable::new(&[("1", codes::TYPE_LONGLONG)]).with_row([Some("1")]),
        ),
    );
    driver
}

#[allow(dead_code)]
pub fn connect(driver: &ScriptedDriver) -> Connection {
    Connection::connect(
        driver,
        &ConnectOptions::new(),
        &ConnectTarget::new().user("app").database("testdb"),
    )
    .expect("scripted connect")
}

/// Single `n` column holding `0..rows`.
#[allow(dead_code)]
pub fn int_table(rows: usize) -> ScriptedTable {
    (0..rows).fold(
        ScriptedTable::new(&[("n", codes::TYPE_LONG)]),
        |table, i| table.with_row([Some(i.to_string())]),
    )
}
