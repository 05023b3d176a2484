//! A single conversation: history, settings and local tool overrides.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;
use warden_common::SessionKey;
use warden_config::SessionProfile;

use crate::tools::{Tool, ToolRegistry};
use crate::{AiClient, AiError, AiResponse, GenerationConfig, Message, ToolCall, ToolDefinition};

/// Settings fixed at session creation from the mode's profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub max_output_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub system_instruction: String,
    /// Tools advertised to the model on every request.
    pub tools: Vec<ToolDefinition>,
}

impl SessionSettings {
    pub fn from_profile(profile: &SessionProfile, tools: Vec<ToolDefinition>) -> Self {
        Self {
            max_output_tokens: profile.max_output_tokens,
            temperature: profile.temperature,
            top_p: profile.top_p,
            system_instruction: profile.system_instruction.clone(),
            tools,
        }
    }

    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

/// Ordered history plus configuration for one (user, mode) pair.
pub struct ConversationSession {
    key: SessionKey,
    history: Vec<Message>,
    settings: SessionSettings,
    bootstrapped: bool,
    local_tools: HashMap<String, Arc<dyn Tool>>,
    created_at: DateTime<Utc>,
    last_active: Instant,
}

impl ConversationSession {
    pub fn new(key: SessionKey, settings: SessionSettings) -> Self {
        Self {
            key,
            history: Vec::new(),
            settings,
            bootstrapped: false,
            local_tools: HashMap::new(),
            created_at: Utc::now(),
            last_active: Instant::now(),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the last send or priming.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_active)
    }

    /// Mark the session primed without injecting anything.
    pub fn mark_bootstrapped(&mut self) {
        self.bootstrapped = true;
    }

    /// Inject synthetic tool exchanges as if the model had requested them,
    /// then mark the session primed.
    pub fn prime(&mut self, exchanges: Vec<(ToolCall, serde_json::Value)>) {
        if !exchanges.is_empty() {
            let calls: Vec<ToolCall> = exchanges.iter().map(|(call, _)| call.clone()).collect();
            self.history.push(Message::assistant("", calls));
            for (call, value) in exchanges {
                self.history.push(Message::tool_result(&call, value));
            }
        }
        self.bootstrapped = true;
        self.last_active = Instant::now();
    }

    /// Attach a tool to this session only. It shadows any global tool of the
    /// same name and is advertised to the model.
    pub fn register_local_tool(&mut self, tool: Arc<dyn Tool>) {
        let definition = tool.definition();
        match self
            .settings
            .tools
            .iter_mut()
            .find(|d| d.name == definition.name)
        {
            Some(existing) => *existing = definition,
            None => self.settings.tools.push(definition),
        }
        debug!(session = %self.key, tool = %tool.name(), "Registered session-local tool");
        self.local_tools.insert(tool.name().to_string(), tool);
    }

    /// Handler for `name`: the session-local override, else the global entry.
    pub fn handler(&self, name: &str, registry: &ToolRegistry) -> Option<Arc<dyn Tool>> {
        self.local_tools
            .get(name)
            .cloned()
            .or_else(|| registry.get(name))
    }

    /// Append turns without contacting the backend.
    pub fn record(&mut self, turns: impl IntoIterator<Item = Message>) {
        self.history.extend(turns);
        self.last_active = Instant::now();
    }

    /// Drop every turn after the first `len`.
    pub fn rollback_to(&mut self, len: usize) {
        if len < self.history.len() {
            debug!(session = %self.key, dropped = self.history.len() - len, "Rolled back history");
            self.history.truncate(len);
        }
    }

    /// The most recent assistant turn, for rewriting fallback tool syntax.
    pub fn last_assistant_mut(&mut self) -> Option<&mut Message> {
        self.history
            .iter_mut()
            .rev()
            .find(|m| m.role == crate::Role::Assistant)
    }

    /// Messages sent to the backend: system instruction first, then history.
    pub fn build_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        if !self.settings.system_instruction.is_empty() {
            messages.push(Message::system(self.settings.system_instruction.clone()));
        }
        messages.extend(self.history.iter().cloned());
        messages
    }

    /// Append `turn`, send the full history and record the reply.
    ///
    /// On a backend error the history is rolled back to before `turn`.
    pub async fn send(
        &mut self,
        client: &dyn AiClient,
        turn: Vec<Message>,
    ) -> Result<AiResponse, AiError> {
        let rollback = self.history.len();
        self.history.extend(turn);
        self.last_active = Instant::now();

        let messages = self.build_messages();
        let generation = self.settings.generation();
        let result = client
            .send_message(&messages, &self.settings.tools, &generation)
            .await;
        match result {
            Ok(response) => {
                self.history.push(Message::assistant(
                    response.content.clone(),
                    response.tool_calls.clone(),
                ));
                Ok(response)
            }
            Err(e) => {
                self.history.truncate(rollback);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("key", &self.key)
            .field("turns", &self.history.len())
            .field("bootstrapped", &self.bootstrapped)
            .field("local_tools", &self.local_tools.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
