//! Tool-call resolution and bootstrap settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Controls the tool-call loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound on model round-trips that carry tool calls (valid range: 1-100).
    pub max_tool_rounds: u32,
    /// Show an "executing tool" notice while tools run.
    pub progress_notices: bool,
    /// Tools that require a human to confirm before they take effect.
    pub confirmation_tools: Vec<String>,
    /// Tools that receive the raw platform message instead of structured args.
    pub message_scoped_tools: Vec<String>,
    /// Seconds an unanswered confirmation prompt stays valid.
    pub confirmation_ttl_secs: u64,
}

impl ResolverConfig {
    pub fn confirmation_ttl(&self) -> Duration {
        Duration::from_secs(self.confirmation_ttl_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 10,
            progress_notices: true,
            confirmation_tools: vec!["send_email".into()],
            message_scoped_tools: vec!["add_reaction".into(), "pin_message".into()],
            confirmation_ttl_secs: 900,
        }
    }
}

/// Context tools run once per session before the first real turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub enabled: bool,
    /// Executed in this order.
    pub tools: Vec<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tools: vec![
                "get_user_profile".into(),
                "get_memories".into(),
                "get_rules".into(),
            ],
        }
    }
}
