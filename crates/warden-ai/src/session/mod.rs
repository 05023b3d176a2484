//! Conversation sessions.
//!
//! A [`ConversationSession`] holds the turn history and generation settings
//! for one (user, mode) pair. The [`SessionStore`] hands out sessions behind
//! per-session async mutexes so two messages for the same session never
//! interleave while unrelated users never share a lock.

mod conversation;
mod store;

pub use conversation::{ConversationSession, SessionSettings};
pub use store::{SessionStore, SharedSession};

#[cfg(test)]
mod tests;
