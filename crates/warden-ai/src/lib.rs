//! Conversation orchestrator for Warden.
//!
//! Runs a per-user conversation with a tool-calling LLM backend:
//! - Sliding-window rate limiting per user
//! - Lazily created sessions per (user, mode), serialized per session
//! - One-time bootstrap priming with context tools
//! - The tool-call loop, including the inline fallback call syntax
//! - Inline vs. file delivery of the final answer
//! - Human confirmation for gated tools

pub mod bootstrap;
pub mod confirm;
pub mod dispatch;
pub mod gemini;
pub mod host;
pub mod orchestrator;
pub mod rate_limit;
pub mod resolver;
pub mod session;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;

pub use bootstrap::BootstrapPrimer;
pub use confirm::{ConfirmationGate, PendingAction};
pub use dispatch::{DeliveryReport, OutputDispatcher};
pub use gemini::{GeminiClient, GeminiConfig};
pub use host::{Delivery, DeliveryError, HostChannel};
pub use orchestrator::{HandleOutcome, IncomingMessage, Orchestrator, OrchestratorError};
pub use rate_limit::RateLimiter;
pub use resolver::{FinalOutcome, RequestContext, ResolverOptions, ToolCallResolver};
pub use session::{ConversationSession, SessionSettings, SessionStore, SharedSession};
pub use tools::{
    Attachment, AttachmentSource, FnTool, Tool, ToolError, ToolInput, ToolOutput, ToolRegistry,
};

/// An LLM backend. Stateless: the session owns the history and sends it
/// in full on every call.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn send_message(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        generation: &GenerationConfig,
    ) -> Result<AiResponse, AiError>;
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Calls requested by an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Result carried by a tool turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResultTurn>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_result: None,
        }
    }

    /// Result turn answering `call`. Only the model-visible value goes in.
    pub fn tool_result(call: &ToolCall, value: serde_json::Value) -> Self {
        Self {
            role: Role::Tool,
            content: String::new(),
            tool_calls: Vec::new(),
            tool_result: Some(ToolResultTurn {
                call_id: call.id.clone(),
                name: call.name.clone(),
                value,
            }),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_result: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolResultTurn {
    pub call_id: String,
    pub name: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Per-request sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AiResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: warden_common::new_id(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout")]
    Timeout,
}
