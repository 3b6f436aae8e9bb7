use crate::security::Secret;
use serde::Deserialize;
use std::fmt;

/// Where and as whom to connect. Every field is optional; the client library
/// falls back to its defaults for absent ones.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectTarget {
    pub host: Option<String>,
    pub database: Option<String>,
    pub port: Option<u16>,
    pub password: Option<Secret>,
    pub user: Option<String>,
    pub socket: Option<String>,
}

impl ConnectTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Secret::new(password.into()));
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    pub fn password_str(&self) -> Option<&str> {
        self.password.as_ref().map(Secret::expose)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Log-safe rendering: `user@host:port/database`, never the password.
impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }
        match (&self.socket, &self.host) {
            (Some(socket), _) => write!(f, "{socket}")?,
            (None, Some(host)) => write!(f, "{host}")?,
            (None, None) => f.write_str("localhost")?,
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if let Some(database) = &self.database {
            write!(f, "/{database}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("user", &self.user)
            .field("socket", &self.socket)
            .finish()
    }
}
