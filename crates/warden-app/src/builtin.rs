//! Context tools available to the console host.
//!
//! The console has no chat platform behind it, so profile, memories and
//! rules come from what the process knows about the local user.

use std::sync::Arc;

use serde_json::json;
use warden_ai::{FnTool, ToolDefinition, ToolInput, ToolOutput, ToolRegistry};

fn definition(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: json!({ "type": "object", "properties": {} }),
    }
}

fn requester(input: &ToolInput) -> String {
    match input {
        ToolInput::Identity(user) => user.to_string(),
        ToolInput::Args(map) => map
            .get("user_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        ToolInput::Message(_) => String::new(),
    }
}

/// Registry with the console's built-in tools.
pub fn registry(rules: Vec<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(FnTool::new(
        definition("get_user_profile", "Look up the profile of the requesting user."),
        |input| async move {
            Ok(ToolOutput::new(json!({
                "user_id": requester(&input),
                "platform": "console",
            })))
        },
    ));

    registry.register(FnTool::new(
        definition("get_memories", "Recall what is remembered about the requesting user."),
        |_| async { Ok(ToolOutput::new(json!({ "memories": [] }))) },
    ));

    let rules = Arc::new(rules);
    registry.register(FnTool::new(
        definition("get_rules", "List the community rules."),
        move |_| {
            let rules = rules.clone();
            async move { Ok(ToolOutput::new(json!({ "rules": *rules }))) }
        },
    ));

    registry.register(FnTool::new(
        definition("get_current_time", "Current date and time in UTC."),
        |_| async { Ok(ToolOutput::new(json!({ "utc": chrono::Utc::now().to_rfc3339() }))) },
    ));

    registry
}
