//! Helper functions for reading environment variables in tests

use mysql_engine::ConnectTarget;

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Connect target built from `MYSQL_TEST_*` variables.
/// Returns None if MYSQL_TEST_HOST and MYSQL_TEST_SOCKET are both unset.
#[allow(dead_code)]
pub fn live_target() -> Option<ConnectTarget> {
    #[cfg(feature = "test-helpers")]
    mysql_engine::test_helpers::load_dotenv();

    let host = var("MYSQL_TEST_HOST");
    let socket = var("MYSQL_TEST_SOCKET");
    if host.is_none() && socket.is_none() {
        return None;
    }

    let mut target = ConnectTarget::new()
        .database(var("MYSQL_TEST_DATABASE").unwrap_or_else(|| "testdb".to_string()));
    if let Some(host) = host {
        target = target.host(host);
    }
    if let Some(socket) = socket {
        target = target.socket(socket);
    }
    if let Some(port) = var("MYSQL_TEST_PORT").and_then(|p| p.parse::<u16>().ok()) {
        target = target.port(port);
    }
    if let Some(user) = var("MYSQL_TEST_USER") {
        target = target.user(user);
    }
    if let Some(password) = var("MYSQL_TEST_PASSWORD") {
        target = target.password(password);
    }
    Some(target)
}

#[allow(dead_code)]
pub fn should_run_live_tests() -> bool {
    live_target().is_some()
}
