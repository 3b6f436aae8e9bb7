use crate::error::MysqlError;
use log::Level;

/// Log helpers with a consistent message shape. Never receives credentials.
#[derive(Debug, Clone, Copy)]
pub struct StructuredLogger {
    enabled: bool,
}

impl StructuredLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn log_query(&self, level: Level, kind: &str, sql: &str, metadata: &[(&str, String)]) {
        if !self.enabled {
            return;
        }

        let mut message = format!("{kind}: {sql}");
        for (key, value) in metadata {
            message.push_str(&format!(", {key}={value}"));
        }

        log::log!(level, "{}", message);
    }

    pub fn log_connection(&self, level: Level, endpoint: &str, action: &str) {
        if !self.enabled {
            return;
        }

        log::log!(level, "Connection {}: {}", action, endpoint);
    }

    pub fn log_error(&self, error: &MysqlError) {
        if !self.enabled {
            return;
        }

        match error.native_code() {
            0 => log::error!("Error: {}", error),
            code => log::error!("Error: {}, code={}", error, code),
        }
    }

    /// Release failures are expected after a lost link and only reported.
    pub fn log_release_failure(&self, what: &str, detail: &str) {
        if !self.enabled {
            return;
        }

        log::warn!("Ignoring failure while releasing {}: {}", what, detail);
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(true)
    }
}
