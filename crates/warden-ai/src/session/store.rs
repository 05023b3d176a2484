//! Keyed session storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use warden_common::{Mode, SessionKey, UserId};
use warden_config::SessionsConfig;

use super::conversation::{ConversationSession, SessionSettings};
use crate::ToolDefinition;

/// A session shared between the store and an in-flight request.
pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// Sessions keyed by (user, mode), created lazily.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, SharedSession>>,
    profiles: SessionsConfig,
    tools: Vec<ToolDefinition>,
}

impl SessionStore {
    /// `tools` is the global tool list every new session advertises.
    pub fn new(profiles: SessionsConfig, tools: Vec<ToolDefinition>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            profiles,
            tools,
        }
    }

    /// Existing session for `key`, or a new one with the mode's defaults.
    pub async fn get_or_create(&self, key: &SessionKey) -> SharedSession {
        if let Some(session) = self.sessions.read().await.get(key) {
            return session.clone();
        }

        let mut map = self.sessions.write().await;
        map.entry(key.clone())
            .or_insert_with(|| {
                let profile = self.profiles.for_mode(key.mode);
                let settings = SessionSettings::from_profile(profile, self.tools.clone());
                info!(user = %key.user, mode = %key.mode, "Created session");
                Arc::new(Mutex::new(ConversationSession::new(key.clone(), settings)))
            })
            .clone()
    }

    pub async fn get(&self, key: &SessionKey) -> Option<SharedSession> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Remove the user's sessions in every mode. Returns how many existed.
    pub async fn clear(&self, user: &UserId) -> usize {
        let mut map = self.sessions.write().await;
        let removed = Mode::ALL
            .iter()
            .filter(|mode| map.remove(&SessionKey::new(user.clone(), **mode)).is_some())
            .count();
        info!(user = %user, removed, "Cleared sessions");
        removed
    }

    pub async fn remove(&self, key: &SessionKey) -> bool {
        self.sessions.write().await.remove(key).is_some()
    }

    /// Drop sessions idle longer than `max_idle`. Sessions busy with a
    /// request are kept.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut map = self.sessions.write().await;
        let before = map.len();
        map.retain(|_, session| match session.try_lock() {
            Ok(session) => session.idle_for(now) <= max_idle,
            Err(_) => true,
        });
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, "Reaped idle sessions");
        }
        removed
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}
