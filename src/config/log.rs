use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where the engine writes its log
pub const ENGINE_LOG_OUTPUT: &str = "stderr";

/// Log configuration handed to the proxy engine
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Log {
    /// Log level. One of: `trace` `debug` `info` `warn` `error` `fatal` `panic`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,

    /// Output target, a file path or `stderr`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Log {
    /// Log section with only a level set
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level: Some(level),
            ..Default::default()
        }
    }

    /// Log section for an embedded engine: `level`, written to stderr
    pub fn engine(level: LogLevel) -> Self {
        Self {
            level: Some(level),
            output: Some(ENGINE_LOG_OUTPUT.to_string()),
        }
    }
}

/// Engine log verbosity
///
/// `Panic` only reports unrecoverable failures, which keeps an embedded
/// engine silent. It is the default for every lifecycle instance.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    #[default]
    Panic,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
            LogLevel::Panic => "panic",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            "panic" => Ok(LogLevel::Panic),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}
