//! Per-mode session defaults.

use serde::{Deserialize, Deserializer, Serialize};
use warden_common::Mode;

/// Generation settings and system instruction for a new session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProfile {
    pub max_output_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub system_instruction: String,
}

impl SessionProfile {
    pub fn text() -> Self {
        Self {
            max_output_tokens: 8192,
            temperature: 0.7,
            top_p: 0.95,
            system_instruction: "You are Warden, an assistant living in a community chat server. \
                 Use the available tools to look up members, moderate, translate and send \
                 messages when asked. Keep answers accurate and well formatted, and never \
                 claim a tool succeeded unless its result says so."
                .into(),
        }
    }

    pub fn voice() -> Self {
        Self {
            max_output_tokens: 1024,
            temperature: 0.7,
            top_p: 0.95,
            system_instruction: "You are Warden, speaking aloud. Answer in one or two short \
                 sentences without formatting."
                .into(),
        }
    }
}

/// Keys present in a `[sessions.*]` table; absent keys keep the mode default.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ProfileOverrides {
    max_output_tokens: Option<u32>,
    temperature: Option<f64>,
    top_p: Option<f64>,
    system_instruction: Option<String>,
}

impl ProfileOverrides {
    fn apply(self, base: SessionProfile) -> SessionProfile {
        SessionProfile {
            max_output_tokens: self.max_output_tokens.unwrap_or(base.max_output_tokens),
            temperature: self.temperature.unwrap_or(base.temperature),
            top_p: self.top_p.unwrap_or(base.top_p),
            system_instruction: self.system_instruction.unwrap_or(base.system_instruction),
        }
    }
}

fn text_profile<'de, D: Deserializer<'de>>(d: D) -> Result<SessionProfile, D::Error> {
    ProfileOverrides::deserialize(d).map(|o| o.apply(SessionProfile::text()))
}

fn voice_profile<'de, D: Deserializer<'de>>(d: D) -> Result<SessionProfile, D::Error> {
    ProfileOverrides::deserialize(d).map(|o| o.apply(SessionProfile::voice()))
}

/// Session defaults for both conversation modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    #[serde(deserialize_with = "text_profile")]
    pub text: SessionProfile,
    #[serde(deserialize_with = "voice_profile")]
    pub voice: SessionProfile,
}

impl SessionsConfig {
    pub fn for_mode(&self, mode: Mode) -> &SessionProfile {
        match mode {
            Mode::Text => &self.text,
            Mode::Voice => &self.voice,
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            text: SessionProfile::text(),
            voice: SessionProfile::voice(),
        }
    }
}
