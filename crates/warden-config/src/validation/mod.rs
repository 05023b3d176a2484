//! Full configuration validation.
//!
//! Each section has its own check; errors are collected into a single
//! `ConfigError` so one pass reports everything wrong with a file.

mod helpers;
mod sections;


use crate::schema::WardenConfig;
use warden_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &WardenConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    sections::validate_rate_limit(&mut errors, config);
    sections::validate_sessions(&mut errors, config);
    sections::validate_resolver(&mut errors, config);
    sections::validate_bootstrap(&mut errors, config);
    sections::validate_output(&mut errors, config);
    sections::validate_backend(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
