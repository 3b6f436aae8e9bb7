//! Connection options and the connect target.

mod target;

pub use target::ConnectTarget;

use crate::error::{MysqlError, Result};
use crate::native::codes;
use std::collections::HashMap;
use std::fmt;

/// Transport used for the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Default,
    Tcp,
    Socket,
    Pipe,
    Memory,
}

impl Protocol {
    pub fn code(self) -> u32 {
        match self {
            Protocol::Default => codes::PROTOCOL_DEFAULT,
            Protocol::Tcp => codes::PROTOCOL_TCP,
            Protocol::Socket => codes::PROTOCOL_SOCKET,
            Protocol::Pipe => codes::PROTOCOL_PIPE,
            Protocol::Memory => codes::PROTOCOL_MEMORY,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "default" => Some(Protocol::Default),
            "tcp" => Some(Protocol::Tcp),
            "socket" => Some(Protocol::Socket),
            "pipe" => Some(Protocol::Pipe),
            "memory" => Some(Protocol::Memory),
            _ => None,
        }
    }
}

/// One driver option applied before the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOption {
    LocalInfile(bool),
    /// Lets the client library reconnect transparently when the link drops.
    Reconnect(bool),
    SslVerifyServerCert(bool),
    ReportDataTruncation(bool),
    SecureAuth(bool),
    Protocol(Protocol),
    /// Seconds.
    ConnectTimeout(u32),
    ReadTimeout(u32),
    WriteTimeout(u32),
    InitCommand(String),
    ReadDefaultFile(String),
    ReadDefaultGroup(String),
    SetCharsetDir(String),
    SetCharsetName(String),
    SharedMemoryBaseName(String),
    SslKey(String),
    SslCert(String),
    SslCa(String),
    SslCaPath(String),
    SslCipher(String),
    Compress,
    NamedPipe,
    /// Report matched rather than changed rows (`CLIENT_FOUND_ROWS`).
    FoundRows,
}

type OptionParser = fn(&str) -> Option<ConnectOption>;

lazy_static::lazy_static! {
    static ref OPTION_PARSERS: HashMap<&'static str, OptionParser> = {
        let mut m: HashMap<&'static str, OptionParser> = HashMap::new();
        m.insert("local_infile", |v| parse_bool(v).map(ConnectOption::LocalInfile));
        m.insert("reconnect", |v| parse_bool(v).map(ConnectOption::Reconnect));
        m.insert("ssl_verify_server_cert", |v| {
            parse_bool(v).map(ConnectOption::SslVerifyServerCert)
        });
        m.insert("report_data_truncation", |v| {
            parse_bool(v).map(ConnectOption::ReportDataTruncation)
        });
        m.insert("secure_auth", |v| parse_bool(v).map(ConnectOption::SecureAuth));
        m.insert("protocol", |v| Protocol::parse(v).map(ConnectOption::Protocol));
        m.insert("connect_timeout", |v| v.trim().parse().ok().map(ConnectOption::ConnectTimeout));
        m.insert("read_timeout", |v| v.trim().parse().ok().map(ConnectOption::ReadTimeout));
        m.insert("write_timeout", |v| v.trim().parse().ok().map(ConnectOption::WriteTimeout));
        m.insert("init_command", |v| Some(ConnectOption::InitCommand(v.to_string())));
        m.insert("read_default_file", |v| Some(ConnectOption::ReadDefaultFile(v.to_string())));
        m.insert("read_default_group", |v| Some(ConnectOption::ReadDefaultGroup(v.to_string())));
        m.insert("set_charset_dir", |v| Some(ConnectOption::SetCharsetDir(v.to_string())));
        m.insert("set_charset_name", |v| Some(ConnectOption::SetCharsetName(v.to_string())));
        m.insert("shared_memory_base_name", |v| {
            Some(ConnectOption::SharedMemoryBaseName(v.to_string()))
        });
        m.insert("ssl_key", |v| Some(ConnectOption::SslKey(v.to_string())));
        m.insert("ssl_cert", |v| Some(ConnectOption::SslCert(v.to_string())));
        m.insert("ssl_ca", |v| Some(ConnectOption::SslCa(v.to_string())));
        m.insert("ssl_capath", |v| Some(ConnectOption::SslCaPath(v.to_string())));
        m.insert("ssl_cipher", |v| Some(ConnectOption::SslCipher(v.to_string())));
        m.insert("compress", |v| parse_flag(v).map(|_| ConnectOption::Compress));
        m.insert("named_pipe", |v| parse_flag(v).map(|_| ConnectOption::NamedPipe));
        m.insert("found_rows", |v| parse_flag(v).map(|_| ConnectOption::FoundRows));
        m
    };
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_flag(value: &str) -> Option<()> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "on" => Some(()),
        _ => None,
    }
}

impl ConnectOption {
    /// Parses a textual `name`/`value` pair as produced by a configuration layer.
    pub fn parse(name: &str, value: &str) -> Result<Self> {
        let key = name.trim().to_ascii_lowercase();
        OPTION_PARSERS
            .get(key.as_str())
            .and_then(|parse| parse(value))
            .ok_or_else(|| MysqlError::unknown_option(format_args!("{name}={value}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectOption::LocalInfile(_) => "local_infile",
            ConnectOption::Reconnect(_) => "reconnect",
            ConnectOption::SslVerifyServerCert(_) => "ssl_verify_server_cert",
            ConnectOption::ReportDataTruncation(_) => "report_data_truncation",
            ConnectOption::SecureAuth(_) => "secure_auth",
            ConnectOption::Protocol(_) => "protocol",
            ConnectOption::ConnectTimeout(_) => "connect_timeout",
            ConnectOption::ReadTimeout(_) => "read_timeout",
            ConnectOption::WriteTimeout(_) => "write_timeout",
            ConnectOption::InitCommand(_) => "init_command",
            ConnectOption::ReadDefaultFile(_) => "read_default_file",
            ConnectOption::ReadDefaultGroup(_) => "read_default_group",
            ConnectOption::SetCharsetDir(_) => "set_charset_dir",
            ConnectOption::SetCharsetName(_) => "set_charset_name",
            ConnectOption::SharedMemoryBaseName(_) => "shared_memory_base_name",
            ConnectOption::SslKey(_) => "ssl_key",
            ConnectOption::SslCert(_) => "ssl_cert",
            ConnectOption::SslCa(_) => "ssl_ca",
            ConnectOption::SslCaPath(_) => "ssl_capath",
            ConnectOption::SslCipher(_) => "ssl_cipher",
            ConnectOption::Compress => "compress",
            ConnectOption::NamedPipe => "named_pipe",
            ConnectOption::FoundRows => "found_rows",
        }
    }

    /// Capability bits this option contributes to the handshake, if any.
    pub fn client_flag(&self) -> Option<u64> {
        match self {
            ConnectOption::FoundRows => Some(codes::CLIENT_FOUND_ROWS),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered option set; later entries override earlier ones in the client library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    options: Vec<ConnectOption>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, option: ConnectOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn push(&mut self, option: ConnectOption) {
        self.options.push(option);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectOption> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let options = pairs
            .into_iter()
            .map(|(name, value)| ConnectOption::parse(name, value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { options })
    }

    /// Reads a JSON object such as `{"reconnect": true, "connect_timeout": 5, "compress": null}`.
    ///
    /// Keys are applied in the order they appear in the document.
    pub fn from_json(json: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| MysqlError::InvalidArgument(format!("Mysql.connect: bad options: {e}")))?;
        let mut options = Self::new();
        for (name, value) in &map {
            let text = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::String(s) => s.clone(),
                other => return Err(MysqlError::unknown_option(format_args!("{name}={other}"))),
            };
            options.push(ConnectOption::parse(name, &text)?);
        }
        Ok(options)
    }

    /// Union of the capability bits requested by the options.
    pub fn client_flags(&self) -> u64 {
        self.options
            .iter()
            .filter_map(ConnectOption::client_flag)
            .fold(0, |acc, flag| acc | flag)
    }
}

impl FromIterator<ConnectOption> for ConnectOptions {
    fn from_iter<T: IntoIterator<Item = ConnectOption>>(iter: T) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}
