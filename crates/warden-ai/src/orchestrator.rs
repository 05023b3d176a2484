//! Per-message entry point.
//!
//! A user turn flows: session lookup → rate-limit gate → one-time priming →
//! tool-call loop → delivery. Gated tool calls are parked until the user
//! confirms or cancels them.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warden_common::{Mode, SessionKey, UserId, WardenError};
use warden_config::WardenConfig;

use crate::bootstrap::BootstrapPrimer;
use crate::confirm::{ConfirmationGate, PendingAction};
use crate::dispatch::{DeliveryReport, OutputDispatcher};
use crate::host::{DeliveryError, HostChannel};
use crate::rate_limit::RateLimiter;
use crate::resolver::{RequestContext, ResolverOptions, ToolCallResolver};
use crate::session::SessionStore;
use crate::tools::ToolRegistry;
use crate::{AiClient, AiError, Message};

/// A user message as the host received it.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub user: UserId,
    pub mode: Mode,
    pub text: String,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    /// The platform message, handed to message-scoped tools.
    pub raw: Option<Value>,
    pub suppress_progress: bool,
}

impl IncomingMessage {
    pub fn new(user: impl Into<UserId>, mode: Mode, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            mode,
            text: text.into(),
            guild_id: None,
            channel_id: None,
            raw: None,
            suppress_progress: false,
        }
    }

    pub fn with_location(mut self, guild_id: Option<String>, channel_id: Option<String>) -> Self {
        self.guild_id = guild_id;
        self.channel_id = channel_id;
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Rejected before reaching the backend.
    RateLimited,
    Completed {
        report: DeliveryReport,
        rounds: u32,
        /// Id of the action now awaiting confirmation, if any.
        confirmation: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Backend(#[from] AiError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("no pending confirmation with id {0}")]
    UnknownConfirmation(String),
}

impl From<OrchestratorError> for WardenError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Backend(e) => WardenError::Backend(e.to_string()),
            OrchestratorError::Delivery(e) => WardenError::Delivery(e.to_string()),
            other => WardenError::Other(other.to_string()),
        }
    }
}

pub struct Orchestrator {
    client: Arc<dyn AiClient>,
    registry: Arc<ToolRegistry>,
    limiter: Arc<RateLimiter>,
    sweep_interval: Duration,
    sessions: SessionStore,
    primer: BootstrapPrimer,
    resolver: ToolCallResolver,
    dispatcher: OutputDispatcher,
    gate: Arc<ConfirmationGate>,
}

impl Orchestrator {
    pub fn new(config: &WardenConfig, client: Arc<dyn AiClient>, registry: ToolRegistry) -> Self {
        let registry = Arc::new(registry);
        Self {
            client,
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            sweep_interval: config.rate_limit.sweep_interval(),
            sessions: SessionStore::new(config.sessions.clone(), registry.definitions()),
            primer: BootstrapPrimer::from_config(&config.bootstrap),
            resolver: ToolCallResolver::new(
                ResolverOptions::from_config(&config.resolver),
                registry.clone(),
            ),
            dispatcher: OutputDispatcher::from_config(&config.output),
            gate: Arc::new(ConfirmationGate::new(config.resolver.confirmation_ttl())),
            registry,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Start the periodic rate-limit and expired-confirmation sweeps at the
    /// configured interval.
    pub fn spawn_sweepers(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.limiter.spawn_sweeper(self.sweep_interval),
            self.gate.spawn_sweeper(self.sweep_interval),
        ]
    }

    /// Handle one user message end to end.
    ///
    /// Tool failures never surface here; backend and delivery errors do.
    pub async fn handle_message(
        &self,
        message: IncomingMessage,
        host: &dyn HostChannel,
    ) -> Result<HandleOutcome, OrchestratorError> {
        let key = SessionKey::new(message.user.clone(), message.mode);
        let session = self.sessions.get_or_create(&key).await;

        if self.limiter.check(&message.user) {
            debug!(user = %message.user, mode = %message.mode, "Rate limited");
            return Ok(HandleOutcome::RateLimited);
        }

        // Held until delivery so replies for one session go out in order.
        let mut session = session.lock().await;
        self.primer.ensure_primed(&mut session, &self.registry).await;

        let ctx = RequestContext {
            user: message.user.clone(),
            guild_id: message.guild_id,
            channel_id: message.channel_id,
            raw_message: message.raw,
            suppress_progress: message.suppress_progress,
        };
        let outcome = self
            .resolver
            .resolve(
                &mut session,
                self.client.as_ref(),
                vec![Message::user(message.text)],
                &ctx,
                host,
            )
            .await?;

        let pending = outcome.confirmation;
        if let Some(action) = &pending {
            self.gate.park(action.clone());
        }

        let report = self
            .dispatcher
            .dispatch(host, outcome.text, outcome.attachments)
            .await?;

        if let Some(action) = &pending {
            host.request_confirmation(action).await?;
        }

        info!(
            user = %message.user,
            mode = %message.mode,
            round = outcome.rounds,
            ?report,
            "Message handled"
        );
        Ok(HandleOutcome::Completed {
            report,
            rounds: outcome.rounds,
            confirmation: pending.map(|a| a.id),
        })
    }

    /// Run a parked action on behalf of `user` and report the result.
    ///
    /// The tool resolves through the originating session first, so a
    /// session-local override runs rather than the global entry.
    pub async fn confirm(
        &self,
        id: &str,
        user: &UserId,
        host: &dyn HostChannel,
    ) -> Result<DeliveryReport, OrchestratorError> {
        let action = self
            .gate
            .take(id, user)
            .ok_or_else(|| OrchestratorError::UnknownConfirmation(id.to_string()))?;

        let handler = match self.sessions.get(&action.session).await {
            Some(session) => {
                let session = session.lock().await;
                session.handler(&action.tool, &self.registry)
            }
            None => self.registry.get(&action.tool),
        };

        let (text, attachments) = match handler {
            None => {
                warn!(user = %user, tool = %action.tool, "Confirmed tool is not registered");
                (format!("`{}` is no longer available.", action.tool), Vec::new())
            }
            Some(tool) => match tool.execute(action.input).await {
                Ok(output) => {
                    info!(user = %user, tool = %action.tool, "Confirmed action executed");
                    let (_, attachments) = output.into_parts();
                    (format!("Done: `{}` completed.", action.tool), attachments)
                }
                Err(e) => {
                    warn!(user = %user, tool = %action.tool, error = %e, "Confirmed action failed");
                    (format!("`{}` failed: {e}", action.tool), Vec::new())
                }
            },
        };

        Ok(self.dispatcher.dispatch(host, text, attachments).await?)
    }

    /// Discard a parked action.
    pub fn cancel(&self, id: &str, user: &UserId) -> Result<PendingAction, OrchestratorError> {
        let action = self
            .gate
            .take(id, user)
            .ok_or_else(|| OrchestratorError::UnknownConfirmation(id.to_string()))?;
        info!(user = %user, tool = %action.tool, "Pending action cancelled");
        Ok(action)
    }

    /// Forget the user's sessions in every mode and any pending actions.
    pub async fn clear(&self, user: &UserId) -> usize {
        let discarded = self.gate.discard_user(user);
        if discarded > 0 {
            debug!(user = %user, discarded, "Discarded pending actions");
        }
        self.sessions.clear(user).await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("primer", &self.primer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::test_support::{definition, recording_tool, RecordingHost, ScriptedClient};
    use crate::tools::{FnTool, ToolOutput};
    use crate::Role;

    type CallLog = Arc<Mutex<Vec<(String, crate::ToolInput)>>>;

    fn registry(log: &CallLog) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(recording_tool("get_user_profile", json!({"name": "Ada"}), log.clone()));
        registry.register(recording_tool("get_memories", json!({"memories": []}), log.clone()));
        registry.register(recording_tool("get_rules", json!({"rules": []}), log.clone()));
        registry.register(recording_tool("send_email", json!({"sent": true}), log.clone()));
        registry
    }

    fn orchestrator(
        config: &WardenConfig,
        client: ScriptedClient,
        log: &CallLog,
    ) -> (Orchestrator, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        (Orchestrator::new(config, client.clone(), registry(log)), client)
    }

    fn names(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    #[tokio::test]
    async fn new_session_is_primed_then_answers_inline() {
        let log = CallLog::default();
        let (orch, client) = orchestrator(
            &WardenConfig::default(),
            ScriptedClient::new().text("Hi Ada!"),
            &log,
        );
        let host = RecordingHost::new();

        let outcome = orch
            .handle_message(IncomingMessage::new("u1", Mode::Text, "hello"), &host)
            .await
            .unwrap();

        assert_eq!(names(&log), vec!["get_user_profile", "get_memories", "get_rules"]);
        assert_eq!(
            outcome,
            HandleOutcome::Completed {
                report: DeliveryReport::Inline,
                rounds: 0,
                confirmation: None
            }
        );
        assert_eq!(host.deliveries()[0].text, "Hi Ada!");

        let sent = client.last_request();
        let roles: Vec<_> = sent.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::Assistant, Role::Tool, Role::Tool, Role::Tool, Role::User]
        );
    }

    #[tokio::test]
    async fn priming_happens_once_per_session() {
        let log = CallLog::default();
        let (orch, _client) = orchestrator(
            &WardenConfig::default(),
            ScriptedClient::new().text("one").text("two"),
            &log,
        );
        let host = RecordingHost::new();

        for text in ["first", "second"] {
            orch.handle_message(IncomingMessage::new("u1", Mode::Text, text), &host)
                .await
                .unwrap();
        }
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rate_limited_message_never_reaches_backend() {
        let mut config = WardenConfig::default();
        config.rate_limit.max_requests = 1;
        let log = CallLog::default();
        let (orch, client) = orchestrator(&config, ScriptedClient::new().text("ok"), &log);
        let host = RecordingHost::new();

        orch.handle_message(IncomingMessage::new("u1", Mode::Text, "a"), &host)
            .await
            .unwrap();
        let second = orch
            .handle_message(IncomingMessage::new("u1", Mode::Text, "b"), &host)
            .await
            .unwrap();

        assert_eq!(second, HandleOutcome::RateLimited);
        assert_eq!(client.request_count(), 1);
        assert_eq!(host.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn confirmation_round_trip() {
        let log = CallLog::default();
        let client = ScriptedClient::new()
            .call("send_email", json!({"to": "mods@example.com"}))
            .text("unused");
        let (orch, _client) = orchestrator(&WardenConfig::default(), client, &log);
        let host = RecordingHost::new();
        let user = UserId::new("u1");

        let outcome = orch
            .handle_message(IncomingMessage::new("u1", Mode::Text, "email the mods"), &host)
            .await
            .unwrap();
        let HandleOutcome::Completed { confirmation: Some(id), .. } = outcome else {
            panic!("expected a pending confirmation");
        };
        assert_eq!(host.confirmations.lock().unwrap()[0].id, id);
        assert!(!names(&log).contains(&"send_email".to_string()));

        assert!(matches!(
            orch.confirm(&id, &UserId::new("u2"), &host).await,
            Err(OrchestratorError::UnknownConfirmation(_))
        ));

        orch.confirm(&id, &user, &host).await.unwrap();
        let (_, input) = log.lock().unwrap().last().cloned().unwrap();
        assert_eq!(input.args().unwrap()["to"], "mods@example.com");
        assert_eq!(host.deliveries().last().unwrap().text, "Done: `send_email` completed.");

        assert!(orch.confirm(&id, &user, &host).await.is_err());
    }

    #[tokio::test]
    async fn confirmed_action_runs_session_local_override() {
        let mut config = WardenConfig::default();
        config.bootstrap.enabled = false;
        let global = CallLog::default();
        let local = CallLog::default();
        let client = ScriptedClient::new().call("send_email", json!({"to": "x@example.com"}));
        let (orch, _client) = orchestrator(&config, client, &global);
        let host = RecordingHost::new();

        let key = SessionKey::new("u1", Mode::Text);
        let session = orch.sessions().get_or_create(&key).await;
        session.lock().await.register_local_tool(Arc::new(recording_tool(
            "send_email",
            json!({"sent": "local"}),
            local.clone(),
        )));

        let outcome = orch
            .handle_message(IncomingMessage::new("u1", Mode::Text, "email x"), &host)
            .await
            .unwrap();
        let HandleOutcome::Completed { confirmation: Some(id), .. } = outcome else {
            panic!("expected a pending confirmation");
        };

        orch.confirm(&id, &UserId::new("u1"), &host).await.unwrap();
        assert_eq!(names(&local), vec!["send_email"]);
        assert!(names(&global).is_empty());
        let (_, input) = local.lock().unwrap()[0].clone();
        assert_eq!(input.args().unwrap()["to"], "x@example.com");
    }

    #[tokio::test]
    async fn cancel_discards_action() {
        let log = CallLog::default();
        let client = ScriptedClient::new().call("send_email", json!({"to": "x@example.com"}));
        let (orch, _client) = orchestrator(&WardenConfig::default(), client, &log);
        let host = RecordingHost::new();

        let outcome = orch
            .handle_message(IncomingMessage::new("u1", Mode::Text, "email x"), &host)
            .await
            .unwrap();
        let HandleOutcome::Completed { confirmation: Some(id), .. } = outcome else {
            panic!("expected a pending confirmation");
        };

        let action = orch.cancel(&id, &UserId::new("u1")).unwrap();
        assert_eq!(action.tool, "send_email");
        assert!(orch.confirm(&id, &UserId::new("u1"), &host).await.is_err());
    }

    #[tokio::test]
    async fn clear_resets_sessions_and_pending_actions() {
        let log = CallLog::default();
        let client = ScriptedClient::new()
            .call("send_email", json!({"to": "x@example.com"}))
            .text("fresh start");
        let (orch, _client) = orchestrator(&WardenConfig::default(), client, &log);
        let host = RecordingHost::new();
        let user = UserId::new("u1");

        let outcome = orch
            .handle_message(IncomingMessage::new("u1", Mode::Text, "email x"), &host)
            .await
            .unwrap();
        let HandleOutcome::Completed { confirmation: Some(id), .. } = outcome else {
            panic!("expected a pending confirmation");
        };

        assert_eq!(orch.clear(&user).await, 1);
        assert!(orch.cancel(&id, &user).is_err());

        orch.handle_message(IncomingMessage::new("u1", Mode::Text, "hi"), &host)
            .await
            .unwrap();
        let primes = names(&log).iter().filter(|n| *n == "get_rules").count();
        assert_eq!(primes, 2);
    }

    #[tokio::test]
    async fn backend_error_surfaces() {
        let log = CallLog::default();
        let (orch, _client) = orchestrator(&WardenConfig::default(), ScriptedClient::new(), &log);
        let host = RecordingHost::new();

        let err = orch
            .handle_message(IncomingMessage::new("u1", Mode::Text, "hello"), &host)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Backend(_)));
        assert!(host.deliveries().is_empty());
    }

    #[tokio::test]
    async fn same_session_requests_do_not_interleave() {
        let mut config = WardenConfig::default();
        config.bootstrap.enabled = false;
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut registry = ToolRegistry::new();
        let (flight, top) = (in_flight.clone(), peak.clone());
        registry.register(FnTool::new(definition("slow"), move |_| {
            let (flight, top) = (flight.clone(), top.clone());
            async move {
                let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                top.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                flight.fetch_sub(1, Ordering::SeqCst);
                Ok(ToolOutput::new(json!({"ok": true})))
            }
        }));

        let client = Arc::new(
            ScriptedClient::new()
                .call("slow", json!({}))
                .text("a")
                .call("slow", json!({}))
                .text("b"),
        );
        let orch = Orchestrator::new(&config, client, registry);
        let host = RecordingHost::new();

        let (a, b) = tokio::join!(
            orch.handle_message(IncomingMessage::new("u1", Mode::Text, "one"), &host),
            orch.handle_message(IncomingMessage::new("u1", Mode::Text, "two"), &host),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        let texts: Vec<_> = host.deliveries().into_iter().map(|d| d.text).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
