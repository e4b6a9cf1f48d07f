//! End-to-end streaming tests over the scripted transport.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};

use tessera_core::{ContentPart, Message, ProviderError, ReasoningEffort};
use tessera_providers::{
    Client, CompletionRequest, FinishReason, ModelRegistry, ScriptedTransport, StreamEvent,
    StreamOptions, Usage,
};

fn client(transport: Arc<ScriptedTransport>) -> Client {
    Client::new(Arc::new(ModelRegistry::builtin()), transport)
}

fn options() -> StreamOptions {
    StreamOptions::new().with_api_key("test")
}

fn hello() -> CompletionRequest {
    CompletionRequest::new(vec![Message::user("hello")])
}

fn delta(delta: Value) -> Value {
    json!({"choices": [{"delta": delta}]})
}

fn finish(reason: &str) -> Value {
    json!({"choices": [{"delta": {}, "finish_reason": reason}]})
}

fn usage(prompt: u32, completion: u32) -> Value {
    json!({"choices": [], "usage": {"prompt_tokens": prompt, "completion_tokens": completion}})
}

#[tokio::test]
async fn test_events_and_result() {
    let transport = Arc::new(ScriptedTransport::replay(vec![
        delta(json!({"role": "assistant", "reasoning_content": "User says hi."})),
        delta(json!({"content": "Hello"})),
        delta(json!({"content": " there"})),
        finish("stop"),
        usage(12, 4),
    ]));
    let client = client(transport);
    let mut handle = client
        .stream_by_id("zai", "glm-5", hello(), &options().with_reasoning(ReasoningEffort::Low))
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = handle.next().await {
        events.push(event);
    }

    assert!(matches!(&events[0], StreamEvent::Start { provider, model } if provider == "zai" && model == "glm-5"));
    assert_eq!(events[1], StreamEvent::ThinkingDelta { delta: "User says hi.".into() });
    assert_eq!(events[2], StreamEvent::TextDelta { delta: "Hello".into() });
    assert_eq!(events[3], StreamEvent::TextDelta { delta: " there".into() });
    assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let completion = handle.result().await.unwrap();
    assert_eq!(completion.text, "Hello there");
    assert_eq!(completion.thinking, "User says hi.");
    assert_eq!(completion.thinking_signature.as_deref(), Some("reasoning_content"));
    assert_eq!(completion.finish_reason, FinishReason::Stop);
    assert_eq!(completion.usage.prompt_tokens, 12);
    assert_eq!(completion.usage.completion_tokens, 4);
}

#[tokio::test]
async fn test_result_is_idempotent_without_reading_events() {
    let transport = Arc::new(ScriptedTransport::replay(vec![
        delta(json!({"content": "ok"})),
        json!({
            "choices": [{"delta": {}, "finish_reason": "stop"}],
            "usage": {
                "prompt_tokens": 1,
                "completion_tokens": 1,
                "prompt_tokens_details": {"cached_tokens": 0},
                "completion_tokens_details": {"reasoning_tokens": 0}
            }
        }),
    ]));
    let handle = client(transport)
        .stream_by_id("zai", "glm-5", hello(), &options())
        .unwrap();

    let first = handle.result().await.unwrap();
    let second = handle.result().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(handle.try_result(), Some(Ok(first.clone())));
    assert_eq!(
        first.usage,
        Usage {
            prompt_tokens: 1,
            completion_tokens: 1,
            cached_tokens: 0,
            cache_write_tokens: 0,
            reasoning_tokens: 0,
        }
    );
    assert_eq!(first.thinking, "");
}

#[tokio::test]
async fn test_tool_calls_assembled_by_index() {
    let transport = Arc::new(ScriptedTransport::replay(vec![
        delta(json!({"tool_calls": [
            {"index": 0, "id": "call_a", "type": "function", "function": {"name": "read_file", "arguments": ""}},
            {"index": 1, "id": "call_b", "type": "function", "function": {"name": "list_dir", "arguments": "{\"path\""}}
        ]})),
        delta(json!({"tool_calls": [{"index": 0, "function": {"arguments": "{\"path\": \"src/main.rs\"}"}}]})),
        delta(json!({"tool_calls": [{"index": 1, "function": {"arguments": ": \".\"}"}}]})),
        finish("tool_calls"),
        usage(30, 20),
    ]));
    let handle = client(transport)
        .stream_by_id("openai", "gpt-4o", hello(), &options())
        .unwrap();

    let completion = handle.result().await.unwrap();
    assert_eq!(completion.finish_reason, FinishReason::ToolUse);
    assert_eq!(completion.tool_calls.len(), 2);
    assert_eq!(completion.tool_calls[0].id, "call_a");
    assert_eq!(completion.tool_calls[0].arguments, json!({"path": "src/main.rs"}));
    assert_eq!(completion.tool_calls[1].name, "list_dir");
    assert_eq!(completion.tool_calls[1].arguments, json!({"path": "."}));

    let message = completion.to_message();
    assert_eq!(message.tool_calls.len(), 2);
}

#[tokio::test]
async fn test_anthropic_stream() {
    let transport = Arc::new(ScriptedTransport::replay(vec![
        json!({"type": "message_start", "message": {"usage": {"input_tokens": 20, "output_tokens": 1, "cache_read_input_tokens": 80}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "Short answer."}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "signature_delta", "signature": "EqQBCgIYAhIM"}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "content_block_start", "index": 1, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": "Hi!"}}),
        json!({"type": "content_block_stop", "index": 1}),
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 9}}),
        json!({"type": "message_stop"}),
    ]));
    let handle = client(transport.clone())
        .stream_by_id(
            "anthropic",
            "claude-sonnet-4-5",
            hello(),
            &options().with_reasoning(ReasoningEffort::Low),
        )
        .unwrap();

    let completion = handle.result().await.unwrap();
    assert_eq!(completion.text, "Hi!");
    assert_eq!(completion.thinking, "Short answer.");
    assert_eq!(completion.thinking_signature.as_deref(), Some("EqQBCgIYAhIM"));
    assert_eq!(completion.usage.prompt_tokens, 100);
    assert_eq!(completion.usage.cached_tokens, 80);
    assert_eq!(completion.usage.completion_tokens, 9);

    let sent = transport.last_request().unwrap();
    assert_eq!(sent.url, "https://api.anthropic.com/v1/messages");
    assert_eq!(sent.body["thinking"]["budget_tokens"], 2048);
}

#[tokio::test]
async fn test_midstream_failure_discards_output() {
    let transport = Arc::new(ScriptedTransport::replay_items(vec![
        Ok(delta(json!({"content": "partial"}))),
        Err(ProviderError::transport("zai", "connection reset")),
    ]));
    let mut handle = client(transport)
        .stream_by_id("zai", "glm-5", hello(), &options())
        .unwrap();

    let events: Vec<StreamEvent> = (&mut handle).collect().await;
    assert_eq!(
        events.last(),
        Some(&StreamEvent::Error {
            error: ProviderError::transport("zai", "connection reset")
        })
    );

    let err = handle.result().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(handle.result().await, Err(err));
}

#[tokio::test]
async fn test_failure_after_finish_reason_keeps_answer() {
    let transport = Arc::new(ScriptedTransport::replay_items(vec![
        Ok(delta(json!({"content": "full answer"}))),
        Ok(finish("stop")),
        Err(ProviderError::transport("openai", "connection reset")),
    ]));
    let mut handle = client(transport)
        .stream_by_id("openai", "gpt-4o", hello(), &options())
        .unwrap();

    let events: Vec<StreamEvent> = (&mut handle).collect().await;
    assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));

    let completion = handle.result().await.unwrap();
    assert_eq!(completion.text, "full answer");
    assert_eq!(completion.finish_reason, FinishReason::Stop);
    assert_eq!(completion.usage, Usage::default());
}

#[tokio::test]
async fn test_malformed_trailing_chunk_keeps_answer() {
    let transport = Arc::new(ScriptedTransport::replay(vec![
        delta(json!({"content": "full answer"})),
        finish("stop"),
        json!({"choices": "garbage"}),
    ]));
    let handle = client(transport)
        .stream_by_id("openai", "gpt-4o", hello(), &options())
        .unwrap();

    let completion = handle.result().await.unwrap();
    assert_eq!(completion.text, "full answer");
}

#[tokio::test]
async fn test_anthropic_thinking_blocks_keep_their_signatures() {
    let transport = Arc::new(ScriptedTransport::replay(vec![
        json!({"type": "message_start", "message": {"usage": {"input_tokens": 5, "output_tokens": 1}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "plan"}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "signature_delta", "signature": "sig-1"}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "content_block_start", "index": 1, "content_block": {"type": "thinking", "thinking": ""}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "thinking_delta", "thinking": "review"}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "signature_delta", "signature": "sig-2"}}),
        json!({"type": "content_block_stop", "index": 1}),
        json!({"type": "content_block_start", "index": 2, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "content_block_delta", "index": 2, "delta": {"type": "text_delta", "text": "Done"}}),
        json!({"type": "content_block_stop", "index": 2}),
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 7}}),
        json!({"type": "message_stop"}),
    ]));
    let handle = client(transport)
        .stream_by_id(
            "anthropic",
            "claude-sonnet-4-5",
            hello(),
            &options().with_reasoning(ReasoningEffort::Low),
        )
        .unwrap();

    let completion = handle.result().await.unwrap();
    let signatures: Vec<Option<&str>> = completion
        .thinking_blocks
        .iter()
        .map(|b| b.signature.as_deref())
        .collect();
    assert_eq!(signatures, vec![Some("sig-1"), Some("sig-2")]);
    assert_eq!(completion.thinking_blocks[1].thinking, "review");

    let message = completion.to_message();
    let thinking_parts = message
        .content
        .parts()
        .into_iter()
        .filter(|p| matches!(p, ContentPart::Thinking { .. }))
        .count();
    assert_eq!(thinking_parts, 2);
}

#[tokio::test]
async fn test_stream_end_without_finish_reason() {
    let transport = Arc::new(ScriptedTransport::replay(vec![delta(json!({"content": "cut off"}))]));
    let handle = client(transport)
        .stream_by_id("deepseek", "deepseek-chat", hello(), &options())
        .unwrap();

    let err = handle.result().await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport { .. }));
}

#[tokio::test]
async fn test_finish_without_usage_settles_at_end_of_stream() {
    let transport = Arc::new(ScriptedTransport::replay(vec![
        delta(json!({"content": "ok"})),
        finish("length"),
    ]));
    let handle = client(transport)
        .stream_by_id("deepseek", "deepseek-chat", hello(), &options())
        .unwrap();

    let completion = handle.result().await.unwrap();
    assert_eq!(completion.finish_reason, FinishReason::MaxTokens);
    assert_eq!(completion.usage, Usage::default());
}

#[tokio::test]
async fn test_malformed_chunk_fails_stream() {
    let transport = Arc::new(ScriptedTransport::replay(vec![
        delta(json!({"content": "fine"})),
        json!({"choices": {"not": "a list"}}),
        finish("stop"),
    ]));
    let handle = client(transport)
        .stream_by_id("zai", "glm-5", hello(), &options())
        .unwrap();

    let err = handle.result().await.unwrap_err();
    assert!(matches!(err, ProviderError::MalformedChunk { .. }));
}

#[tokio::test]
async fn test_open_failure_surfaces_as_error() {
    let transport = Arc::new(ScriptedTransport::failing(ProviderError::api_error(
        "zai",
        401,
        "invalid api key",
    )));
    let handle = client(transport)
        .stream_by_id("zai", "glm-5", hello(), &options())
        .unwrap();

    let err = handle.result().await.unwrap_err();
    assert!(matches!(err, ProviderError::ApiError { status: 401, .. }));
}

#[tokio::test]
async fn test_dropping_handle_releases_transport() {
    let (transport, feed) = ScriptedTransport::live();
    let transport = Arc::new(transport);
    let mut handle = client(transport.clone())
        .stream_by_id("zai", "glm-5", hello(), &options())
        .unwrap();

    assert!(feed.push(delta(json!({"content": "first"}))));
    loop {
        match handle.next().await {
            Some(StreamEvent::TextDelta { delta }) => {
                assert_eq!(delta, "first");
                break;
            }
            Some(StreamEvent::Start { .. }) => continue,
            other => panic!("unexpected event {:?}", other),
        }
    }

    drop(handle);
    tokio::time::timeout(Duration::from_secs(5), feed.closed())
        .await
        .expect("transport stream released after drop");

    assert_eq!(transport.chunks_pulled(), 1);
    assert!(!feed.push(delta(json!({"content": "too late"}))));
}

#[tokio::test]
async fn test_explicit_cancel() {
    let (transport, feed) = ScriptedTransport::live();
    let handle = client(Arc::new(transport))
        .stream_by_id("zai", "glm-5", hello(), &options())
        .unwrap();

    handle.cancel();
    let err = handle.result().await.unwrap_err();
    assert_eq!(err, ProviderError::Cancelled { provider: "zai".into() });
    drop(feed);
}
