//! Per-user request rate limiting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sliding-window rate limit applied before any backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window (valid range: 1-10000).
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// How often expired entries are swept, in milliseconds.
    pub sweep_interval_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Sweep period, never zero.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_ms: 60_000,
            sweep_interval_ms: 1_000,
        }
    }
}
