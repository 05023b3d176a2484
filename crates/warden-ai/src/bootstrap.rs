//! One-time context priming for new sessions.
//!
//! Before a session's first real turn, a fixed list of context tools
//! (profile, memories, rules) runs directly against the registry. The
//! results are written into history as if the model had asked for them, so
//! the first answer already knows who it is talking to.

use serde_json::json;
use tracing::{debug, info, warn};
use warden_common::UserId;
use warden_config::BootstrapConfig;

use crate::session::ConversationSession;
use crate::tools::{ToolInput, ToolOutput, ToolRegistry, UNKNOWN_FUNCTION};
use crate::ToolCall;

#[derive(Debug, Clone)]
pub struct BootstrapPrimer {
    enabled: bool,
    tools: Vec<String>,
}

impl BootstrapPrimer {
    pub fn new(tools: Vec<String>) -> Self {
        Self {
            enabled: true,
            tools,
        }
    }

    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            enabled: config.enabled,
            tools: config.tools.clone(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            tools: Vec::new(),
        }
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    /// Prime `session` unless it already is. Never fails: a tool that errors
    /// or is missing contributes an error result instead.
    pub async fn ensure_primed(&self, session: &mut ConversationSession, registry: &ToolRegistry) {
        if session.is_bootstrapped() {
            return;
        }
        if !self.enabled {
            session.mark_bootstrapped();
            return;
        }

        let owner = session.key().user.clone();
        let mut exchanges = Vec::with_capacity(self.tools.len());
        for name in &self.tools {
            let call = ToolCall::new(name.clone(), json!({ "user_id": owner.as_str() }));
            let value = self.run(name, &owner, session, registry).await;
            exchanges.push((call, value));
        }

        info!(
            user = %owner,
            mode = %session.key().mode,
            tools = exchanges.len(),
            "Session bootstrapped"
        );
        session.prime(exchanges);
    }

    async fn run(
        &self,
        name: &str,
        owner: &UserId,
        session: &ConversationSession,
        registry: &ToolRegistry,
    ) -> serde_json::Value {
        let Some(tool) = session.handler(name, registry) else {
            warn!(tool = %name, "Bootstrap tool not registered");
            return ToolOutput::error(UNKNOWN_FUNCTION).value;
        };

        debug!(tool = %name, user = %owner, "Running bootstrap tool");
        match tool.execute(ToolInput::Identity(owner.clone())).await {
            // Attachments from priming have nowhere to go.
            Ok(output) => output.into_parts().0,
            Err(e) => {
                warn!(tool = %name, error = %e, "Bootstrap tool failed");
                ToolOutput::error(e).value
            }
        }
    }
}
