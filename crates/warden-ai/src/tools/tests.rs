//! Tests for the registry and tool value types.

use std::sync::{Arc, Mutex};

use serde_json::json;

use super::*;
use crate::test_support::{definition, failing_tool, recording_tool};
use crate::ToolDefinition;

#[tokio::test]
async fn registered_tool_is_found_and_executes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    registry.register(recording_tool("get_rules", json!({"rules": []}), log.clone()));

    let tool = registry.get("get_rules").expect("registered");
    let out = tool
        .execute(ToolInput::Identity("u1".into()))
        .await
        .unwrap();

    assert_eq!(out.value, json!({"rules": []}));
    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(registry.get("missing").is_none());
}

#[test]
fn later_registration_replaces_earlier() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    registry.register(recording_tool("dup", json!(1), log.clone()));
    registry.register(recording_tool("dup", json!(2), log));
    assert_eq!(registry.len(), 1);
}

#[test]
fn definitions_are_sorted_by_name() {
    let mut registry = ToolRegistry::new();
    registry.register(failing_tool("zeta", "x"));
    registry.register(failing_tool("alpha", "x"));
    let names: Vec<_> = registry
        .definitions()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[tokio::test]
async fn failing_tool_reports_message() {
    let tool = failing_tool("boom", "boom");
    let err = tool
        .execute(ToolInput::Identity("u1".into()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "boom");
}

#[test]
fn error_output_has_error_key() {
    let out = ToolOutput::error("Unknown function");
    assert!(out.is_error());
    assert_eq!(out.value, json!({"error": "Unknown function"}));
}

#[test]
fn into_parts_separates_attachments() {
    let out = ToolOutput::new(json!({"ok": true}))
        .with_attachment(Attachment::from_bytes(b"png".to_vec(), "chart.png"));
    let (value, attachments) = out.into_parts();
    assert_eq!(value, json!({"ok": true}));
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].display_name, "chart.png");
}

#[test]
fn gemini_declaration_omits_empty_schema() {
    let decl = to_gemini_tool(&definition("get_rules"));
    assert!(decl.get("parameters").is_none());

    let decl = to_gemini_tool(&ToolDefinition {
        name: "translate".into(),
        description: "Translate text".into(),
        parameters: json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        }),
    });
    assert_eq!(decl["parameters"]["required"], json!(["text"]));
}

#[test]
fn attachment_source_debug_hides_bytes() {
    let a = Attachment::from_bytes(vec![0u8; 4096], "dump.bin");
    assert_eq!(format!("{:?}", a.source), "Bytes(4096 bytes)");
}
