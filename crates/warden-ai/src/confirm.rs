//! Parking area for tool calls that need a human yes/no.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;
use warden_common::{new_correlation_id, SessionKey, UserId};

use crate::rate_limit::min_period;
use crate::tools::ToolInput;

/// How long an unanswered prompt stays valid when no TTL is configured.
pub const DEFAULT_CONFIRMATION_TTL: Duration = Duration::from_secs(900);

/// A gated tool call waiting for the requester to confirm or cancel.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub id: String,
    pub user: UserId,
    /// Session whose handlers resolved the call.
    pub session: SessionKey,
    pub tool: String,
    /// Input exactly as it will be handed to the tool.
    pub input: ToolInput,
    /// Structured arguments for display; empty for identity or message input.
    pub args: serde_json::Value,
    pub created_at: Instant,
}

impl PendingAction {
    pub fn new(session: SessionKey, tool: impl Into<String>, input: ToolInput) -> Self {
        let args = match &input {
            ToolInput::Args(map) => serde_json::Value::Object(map.clone()),
            ToolInput::Identity(_) | ToolInput::Message(_) => {
                serde_json::Value::Object(Default::default())
            }
        };
        Self {
            id: new_correlation_id(),
            user: session.user.clone(),
            session,
            tool: tool.into(),
            input,
            args,
            created_at: Instant::now(),
        }
    }
}

#[derive(Debug)]
pub struct ConfirmationGate {
    ttl: Duration,
    pending: Mutex<HashMap<String, PendingAction>>,
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_TTL)
    }
}

impl ConfirmationGate {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn park(&self, action: PendingAction) {
        self.lock().insert(action.id.clone(), action);
    }

    /// Remove and return the action if it exists, belongs to `user` and has
    /// not expired.
    pub fn take(&self, id: &str, user: &UserId) -> Option<PendingAction> {
        self.take_at(id, user, Instant::now())
    }

    pub fn take_at(&self, id: &str, user: &UserId, now: Instant) -> Option<PendingAction> {
        let mut pending = self.lock();
        match pending.get(id) {
            Some(action) if self.is_expired(action, now) => {
                pending.remove(id);
                None
            }
            Some(action) if &action.user == user => pending.remove(id),
            _ => None,
        }
    }

    /// Drop every pending action owned by `user`.
    pub fn discard_user(&self, user: &UserId) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, action| &action.user != user);
        before - pending.len()
    }

    /// Drop actions older than the TTL.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, action| !self.is_expired(action, now));
        let removed = before - pending.len();
        if removed > 0 {
            debug!(removed, "Expired unanswered confirmations");
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the gate is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = min_period(interval, "confirmation sweep");
        let gate: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match gate.upgrade() {
                    Some(gate) => {
                        gate.sweep();
                    }
                    None => break,
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, action: &PendingAction, now: Instant) -> bool {
        now.saturating_duration_since(action.created_at) > self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingAction>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}
