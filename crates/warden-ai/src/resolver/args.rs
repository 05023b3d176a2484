//! Argument preparation for tool calls.

use std::collections::HashSet;

use serde_json::Value;

use super::RequestContext;
use crate::tools::ToolInput;

/// Decide what a tool receives.
///
/// Message-scoped tools get the raw platform message. Otherwise empty or
/// non-object arguments collapse to the bare requester identity, and
/// non-empty ones are merged with the requester's identity and location.
/// The requester's identity always wins over a model-supplied `user_id`.
pub(crate) fn prepare_input(
    tool: &str,
    args: &Value,
    ctx: &RequestContext,
    message_scoped: &HashSet<String>,
) -> ToolInput {
    if message_scoped.contains(tool) {
        if let Some(raw) = &ctx.raw_message {
            return ToolInput::Message(raw.clone());
        }
    }

    match args {
        Value::Object(map) if !map.is_empty() => {
            let mut merged = map.clone();
            merged.insert("user_id".into(), Value::String(ctx.user.as_str().into()));
            if let Some(guild) = &ctx.guild_id {
                merged.insert("guild_id".into(), Value::String(guild.clone()));
            }
            if let Some(channel) = &ctx.channel_id {
                merged.insert("channel_id".into(), Value::String(channel.clone()));
            }
            ToolInput::Args(merged)
        }
        _ => ToolInput::Identity(ctx.user.clone()),
    }
}
