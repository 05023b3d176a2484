//! Warden configuration system.
//!
//! TOML-based configuration for the conversation orchestrator. Every
//! section uses serde defaults so a partial (or empty) file works.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use warden_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    BackendConfig, BootstrapConfig, LogLevel, LoggingConfig, OutputConfig, RateLimitConfig,
    ResolverConfig, SessionProfile, SessionsConfig, WardenConfig, CONFIG_SCHEMA_VERSION,
};

use std::path::Path;

use warden_common::ConfigError;

/// Load config from the platform default path, creating it if missing.
pub fn load_config() -> Result<WardenConfig, ConfigError> {
    toml_loader::load_default()
}

/// Load config from `path` when given, otherwise from the platform default.
pub fn load_config_from(path: Option<&Path>) -> Result<WardenConfig, ConfigError> {
    match path {
        Some(path) => toml_loader::load_from_path(path),
        None => toml_loader::load_default(),
    }
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &WardenConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
