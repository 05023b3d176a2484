//! Per-section validators.

use warden_common::Mode;

use crate::schema::WardenConfig;

use super::helpers::{validate_non_empty, validate_range, validate_range_f64};

pub(crate) fn validate_rate_limit(errors: &mut Vec<String>, config: &WardenConfig) {
    let rl = &config.rate_limit;
    validate_range(
        errors,
        "rate_limit.max_requests",
        rl.max_requests.into(),
        1,
        10_000,
    );
    validate_range(errors, "rate_limit.window_ms", rl.window_ms, 100, 86_400_000);
    validate_range(
        errors,
        "rate_limit.sweep_interval_ms",
        rl.sweep_interval_ms,
        100,
        3_600_000,
    );
}

pub(crate) fn validate_sessions(errors: &mut Vec<String>, config: &WardenConfig) {
    for mode in Mode::ALL {
        let profile = config.sessions.for_mode(mode);
        validate_range(
            errors,
            &format!("sessions.{mode}.max_output_tokens"),
            profile.max_output_tokens.into(),
            1,
            65_536,
        );
        validate_range_f64(
            errors,
            &format!("sessions.{mode}.temperature"),
            profile.temperature,
            0.0,
            2.0,
        );
        validate_range_f64(
            errors,
            &format!("sessions.{mode}.top_p"),
            profile.top_p,
            0.0,
            1.0,
        );
    }
}

pub(crate) fn validate_resolver(errors: &mut Vec<String>, config: &WardenConfig) {
    validate_range(
        errors,
        "resolver.max_tool_rounds",
        config.resolver.max_tool_rounds.into(),
        1,
        100,
    );
    validate_range(
        errors,
        "resolver.confirmation_ttl_secs",
        config.resolver.confirmation_ttl_secs,
        1,
        86_400,
    );
}

pub(crate) fn validate_bootstrap(errors: &mut Vec<String>, config: &WardenConfig) {
    for (i, name) in config.bootstrap.tools.iter().enumerate() {
        validate_non_empty(errors, &format!("bootstrap.tools[{i}]"), name);
    }
}

pub(crate) fn validate_output(errors: &mut Vec<String>, config: &WardenConfig) {
    let out = &config.output;
    validate_range(
        errors,
        "output.inline_limit",
        out.inline_limit as u64,
        100,
        100_000,
    );
    validate_non_empty(errors, "output.overflow_notice", &out.overflow_notice);
    validate_non_empty(errors, "output.attachments_notice", &out.attachments_notice);
    validate_non_empty(errors, "output.overflow_file_name", &out.overflow_file_name);
    if out.overflow_notice.chars().count() > out.inline_limit {
        errors.push("output.overflow_notice is longer than output.inline_limit".into());
    }
}

pub(crate) fn validate_backend(errors: &mut Vec<String>, config: &WardenConfig) {
    validate_non_empty(errors, "backend.model", &config.backend.model);
    validate_non_empty(errors, "backend.api_key_env", &config.backend.api_key_env);
    validate_range(
        errors,
        "backend.request_timeout_secs",
        config.backend.request_timeout_secs,
        1,
        600,
    );
}
