//! Sliding-window request limiter keyed by user.
//!
//! Each user gets one entry holding the start of the current window and the
//! number of requests seen inside it. Expired entries self-heal on lookup;
//! the periodic sweep only keeps the map from growing without bound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use warden_common::UserId;
use warden_config::RateLimitConfig;

#[derive(Debug)]
struct Entry {
    window_start: Instant,
    count: u32,
}

/// Per-user sliding-window counter.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    entries: RwLock<HashMap<UserId, Arc<Mutex<Entry>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Record a request from `user` and report whether it is blocked.
    pub fn check(&self, user: &UserId) -> bool {
        self.check_at(user, Instant::now())
    }

    /// [`check`](Self::check) against an explicit clock reading.
    pub fn check_at(&self, user: &UserId, now: Instant) -> bool {
        let entry = {
            let map = self.entries.read().unwrap_or_else(|e| e.into_inner());
            map.get(user).cloned()
        };

        let entry = match entry {
            Some(entry) => entry,
            None => {
                let mut map = self.entries.write().unwrap_or_else(|e| e.into_inner());
                match map.get(user) {
                    Some(entry) => entry.clone(),
                    None => {
                        map.insert(
                            user.clone(),
                            Arc::new(Mutex::new(Entry {
                                window_start: now,
                                count: 1,
                            })),
                        );
                        return false;
                    }
                }
            }
        };

        let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        if now.saturating_duration_since(entry.window_start) > self.window {
            entry.window_start = now;
            entry.count = 1;
            return false;
        }

        entry.count = entry.count.saturating_add(1);
        let blocked = entry.count > self.max_requests;
        if blocked {
            trace!(user = %user, count = entry.count, "Request over limit");
        }
        blocked
    }

    /// Drop entries whose window has elapsed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut map = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = map.len();
        map.retain(|_, entry| {
            let entry = entry.lock().unwrap_or_else(|e| e.into_inner());
            now.saturating_duration_since(entry.window_start) <= self.window
        });
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, "Swept expired rate-limit entries");
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the limiter is dropped.
    ///
    /// A zero interval is raised to one millisecond.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = min_period(interval, "rate-limit sweep");
        let limiter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match limiter.upgrade() {
                    Some(limiter) => {
                        limiter.sweep();
                    }
                    None => break,
                }
            }
        })
    }

    /// Number of tracked users.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `tokio::time::interval` panics on a zero period.
pub(crate) fn min_period(interval: Duration, what: &str) -> Duration {
    if interval.is_zero() {
        warn!(task = what, "Zero interval configured, using 1ms");
        Duration::from_millis(1)
    } else {
        interval
    }
}
