//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// `tracing_subscriber::EnvFilter` directive for the warden crates.
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "warden=debug,warden_ai=debug",
            LogLevel::Info => "warden=info,warden_ai=info",
            LogLevel::Warning => "warden=warn,warden_ai=warn",
            LogLevel::Error => "warden=error,warden_ai=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
