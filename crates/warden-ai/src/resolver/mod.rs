//! The tool-call loop.
//!
//! Sends a turn, executes whatever tools the model asks for, feeds the
//! results back and repeats until the model answers without calling
//! anything (or the round cap is hit).

mod args;
mod fallback;
mod resolve;

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;
use warden_common::UserId;
use warden_config::ResolverConfig;

use crate::confirm::PendingAction;
use crate::tools::Attachment;

pub use resolve::ToolCallResolver;

/// Resolver knobs, taken from `[resolver]`.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub max_tool_rounds: u32,
    pub progress_notices: bool,
    /// Tools that never run without a human confirming first.
    pub confirmation_tools: HashSet<String>,
    /// Tools that receive the raw platform message instead of arguments.
    pub message_scoped_tools: HashSet<String>,
}

impl ResolverOptions {
    /// A zero round cap would never run a tool, so it is raised to one.
    pub fn from_config(config: &ResolverConfig) -> Self {
        if config.max_tool_rounds == 0 {
            warn!("resolver.max_tool_rounds is 0, using 1");
        }
        Self {
            max_tool_rounds: config.max_tool_rounds.max(1),
            progress_notices: config.progress_notices,
            confirmation_tools: config.confirmation_tools.iter().cloned().collect(),
            message_scoped_tools: config.message_scoped_tools.iter().cloned().collect(),
        }
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

/// Who is asking, and from where.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: UserId,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    /// The platform message that triggered the request, if the host has one.
    pub raw_message: Option<Value>,
    pub suppress_progress: bool,
}

impl RequestContext {
    pub fn for_user(user: UserId) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }
}

/// Result of one resolution cycle.
#[derive(Debug, Default)]
pub struct FinalOutcome {
    pub text: String,
    /// Tool attachments in the order the tools produced them.
    pub attachments: Vec<Attachment>,
    pub rounds: u32,
    /// Set when a gated tool stopped the loop.
    pub confirmation: Option<PendingAction>,
}

pub(crate) use args::prepare_input;
