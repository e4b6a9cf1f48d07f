//! Preserve-thinking resolution from settings and overrides, checked on the wire.

use std::sync::Arc;

use serde_json::{json, Value};

use tessera_core::{ModelDescriptor, ProviderError, ReasoningEffort, WireApi};
use tessera_providers::{Client, ModelRegistry, ScriptedTransport};
use tessera_session::{SessionBuilder, SettingsManager};

fn glm5() -> ModelDescriptor {
    ModelDescriptor::new(
        "zai",
        "glm-5",
        WireApi::OpenAiCompletions,
        "https://api.z.ai/api/coding/paas/v4",
    )
    .with_reasoning(true)
    .with_limits(204_800, 131_072)
    .with_cost(0.0, 0.0, 0.0, 0.0)
}

fn settings(preserve: bool) -> Arc<SettingsManager> {
    let settings = SettingsManager::default();
    settings.set_preserve_thinking(preserve);
    settings.set_reasoning(ReasoningEffort::Medium);
    Arc::new(settings)
}

fn turn(thinking: &str, text: &str) -> Vec<Value> {
    vec![
        json!({"choices": [{"delta": {"role": "assistant", "reasoning_content": thinking}}]}),
        json!({"choices": [{"delta": {"content": text}}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
        json!({"choices": [], "usage": {"prompt_tokens": 3, "completion_tokens": 2}}),
    ]
}

fn client(transport: Arc<ScriptedTransport>) -> Client {
    Client::new(Arc::new(ModelRegistry::new()), transport)
}

#[test]
fn test_settings_value_used_without_override() {
    let transport = Arc::new(ScriptedTransport::replay(vec![]));
    let session = SessionBuilder::new()
        .client(client(transport))
        .settings(settings(true))
        .model(glm5())
        .build()
        .unwrap();

    assert!(session.preserve_thinking());
}

#[test]
fn test_override_beats_settings() {
    let transport = Arc::new(ScriptedTransport::replay(vec![]));
    let session = SessionBuilder::new()
        .client(client(transport))
        .settings(settings(true))
        .model(glm5())
        .preserve_thinking(false)
        .build()
        .unwrap();

    assert!(!session.preserve_thinking());
}

#[tokio::test]
async fn test_preserved_session_keeps_history_on_the_wire() {
    let mut chunks = turn("first thoughts", "one");
    chunks.extend(turn("second thoughts", "two"));
    let transport = Arc::new(ScriptedTransport::replay(chunks));

    let mut session = SessionBuilder::new()
        .client(client(transport.clone()))
        .settings(settings(true))
        .model(glm5())
        .api_key("test")
        .build()
        .unwrap();

    session.send("hello").await.unwrap();
    let first = transport.last_request().unwrap();
    assert_eq!(first.url, "https://api.z.ai/api/coding/paas/v4/chat/completions");
    assert_eq!(
        first.body["thinking"],
        json!({"type": "enabled", "clear_history": false})
    );

    session.send("again").await.unwrap();
    let second = transport.last_request().unwrap();
    let messages = second.body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "one");
    assert_eq!(messages[1]["reasoning_content"], "first thoughts");
}

#[tokio::test]
async fn test_discarding_session_strips_prior_reasoning() {
    let mut chunks = turn("first thoughts", "one");
    chunks.extend(turn("second thoughts", "two"));
    let transport = Arc::new(ScriptedTransport::replay(chunks));

    let mut session = SessionBuilder::new()
        .client(client(transport.clone()))
        .settings(settings(false))
        .model(glm5())
        .api_key("test")
        .build()
        .unwrap();

    session.send("hello").await.unwrap();
    let first = transport.last_request().unwrap();
    assert_eq!(first.body["thinking"], json!({"type": "enabled"}));

    session.send("again").await.unwrap();
    let second = transport.last_request().unwrap();
    let assistant = &second.body["messages"][1];
    assert_eq!(assistant["content"], "one");
    assert!(assistant.get("reasoning_content").is_none());
    assert_eq!(session.usage().completion_tokens, 4);
}

#[tokio::test]
async fn test_failed_turn_is_not_kept_in_history() {
    let transport = Arc::new(ScriptedTransport::replay_items(vec![
        Ok(json!({"choices": [{"delta": {"content": "par"}}]})),
        Err(ProviderError::transport("zai", "connection reset")),
    ]));

    let mut session = SessionBuilder::new()
        .client(client(transport.clone()))
        .settings(settings(false))
        .model(glm5())
        .api_key("test")
        .build()
        .unwrap();

    let err = session.send("hello").await.unwrap_err();
    assert!(err.to_string().contains("connection reset"));
    assert!(session.messages().is_empty());

    // The retry carries a single user turn.
    let _ = session.send("hello").await;
    let retry = transport.last_request().unwrap();
    let roles: Vec<&str> = retry.body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["role"].as_str())
        .collect();
    assert_eq!(roles, vec!["user"]);
}
