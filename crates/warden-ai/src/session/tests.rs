//! Tests for conversation sessions and the session store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use warden_common::{Mode, SessionKey, UserId};
use warden_config::SessionsConfig;

use super::*;
use crate::test_support::{definition, failing_tool, ScriptedClient};
use crate::tools::ToolRegistry;
use crate::{AiError, Message, Role, ToolCall};

fn store() -> SessionStore {
    SessionStore::new(SessionsConfig::default(), vec![definition("get_rules")])
}

#[tokio::test]
async fn get_or_create_returns_same_session() {
    let store = store();
    let key = SessionKey::new("u1", Mode::Text);
    let a = store.get_or_create(&key).await;
    let b = store.get_or_create(&key).await;
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(store.count().await, 1);
}

#[tokio::test]
async fn modes_are_separate_namespaces() {
    let store = store();
    let text = store.get_or_create(&SessionKey::new("u1", Mode::Text)).await;
    let voice = store.get_or_create(&SessionKey::new("u1", Mode::Voice)).await;
    assert!(!Arc::ptr_eq(&text, &voice));

    let text = text.lock().await;
    let voice = voice.lock().await;
    assert!(voice.settings().max_output_tokens < text.settings().max_output_tokens);
    assert_ne!(
        voice.settings().system_instruction,
        text.settings().system_instruction
    );
}

#[tokio::test]
async fn clear_removes_both_modes_and_resets_bootstrap() {
    let store = store();
    let key = SessionKey::new("u1", Mode::Text);
    store.get_or_create(&key).await.lock().await.mark_bootstrapped();
    store.get_or_create(&SessionKey::new("u1", Mode::Voice)).await;
    store.get_or_create(&SessionKey::new("u2", Mode::Text)).await;

    assert_eq!(store.clear(&UserId::new("u1")).await, 2);
    assert_eq!(store.count().await, 1);

    let fresh = store.get_or_create(&key).await;
    assert!(!fresh.lock().await.is_bootstrapped());
}

#[tokio::test]
async fn reap_idle_keeps_busy_sessions() {
    let store = store();
    let idle = SessionKey::new("idle", Mode::Text);
    let busy = SessionKey::new("busy", Mode::Text);
    store.get_or_create(&idle).await;
    let busy_session = store.get_or_create(&busy).await;
    let _guard = busy_session.lock().await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.reap_idle(Duration::from_millis(5)).await, 1);
    assert!(store.get(&idle).await.is_none());
    assert!(store.get(&busy).await.is_some());
}

#[tokio::test]
async fn send_puts_system_instruction_first_and_records_reply() {
    let store = store();
    let session = store.get_or_create(&SessionKey::new("u1", Mode::Text)).await;
    let mut session = session.lock().await;
    let client = ScriptedClient::new().text("hi there");

    let response = session
        .send(&client, vec![Message::user("hello")])
        .await
        .unwrap();
    assert_eq!(response.content, "hi there");

    let sent = client.last_request();
    assert_eq!(sent[0].role, Role::System);
    assert_eq!(sent[1], Message::user("hello"));

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "hi there");
}

#[tokio::test]
async fn send_error_rolls_back_turn() {
    let store = store();
    let session = store.get_or_create(&SessionKey::new("u1", Mode::Text)).await;
    let mut session = session.lock().await;
    let client = ScriptedClient::new().error(AiError::Timeout);

    let err = session
        .send(&client, vec![Message::user("hello")])
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::Timeout));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn prime_injects_exchange_and_marks_bootstrapped() {
    let store = store();
    let session = store.get_or_create(&SessionKey::new("u1", Mode::Text)).await;
    let mut session = session.lock().await;

    let call = ToolCall::new("get_rules", json!({"user_id": "u1"}));
    session.prime(vec![(call.clone(), json!({"rules": ["be kind"]}))]);

    assert!(session.is_bootstrapped());
    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].tool_calls, vec![call.clone()]);
    let result = history[1].tool_result.as_ref().unwrap();
    assert_eq!(result.call_id, call.id);
    assert_eq!(result.value, json!({"rules": ["be kind"]}));
}

#[tokio::test]
async fn local_tool_shadows_global_and_is_advertised() {
    let mut registry = ToolRegistry::new();
    registry.register(failing_tool("get_rules", "global"));

    let store = store();
    let session = store.get_or_create(&SessionKey::new("u1", Mode::Text)).await;
    let mut session = session.lock().await;
    session.register_local_tool(Arc::new(failing_tool("get_rules", "local")));
    session.register_local_tool(Arc::new(failing_tool("scratchpad", "local")));

    let handler = session.handler("get_rules", &registry).unwrap();
    let err = handler
        .execute(crate::ToolInput::Identity("u1".into()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "local");

    let names: Vec<_> = session.settings().tools.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["get_rules", "scratchpad"]);
    assert!(session.handler("nothing", &registry).is_none());
}
