//! OpenAI Chat Completions family.
//!
//! Also covers the OpenAI-compatible endpoints of Z.ai, DeepSeek and
//! DashScope, which differ mainly in how reasoning is switched on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use tessera_core::message::ImageSource;
use tessera_core::{
    Content, ContentPart, InputModality, Message, ModelDescriptor, ProviderError, ReasoningEffort,
    Role, ToolDefinition,
};

use crate::options::StreamOptions;
use crate::payload::{self, Reasoning};
use crate::stream::{ChunkDecoder, Delta, ProviderChunk, ToolCallFragment};
use crate::types::{CompletionRequest, FinishReason, Usage};

/// Streaming fields that may carry reasoning text, in lookup order.
const REASONING_FIELDS: [&str; 3] = ["reasoning_content", "reasoning", "reasoning_text"];

/// How a compatible endpoint expects reasoning to be controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingFormat {
    /// `thinking: {type, clear_history}` (Z.ai)
    Zai,
    /// `enable_thinking: bool` (Qwen on DashScope)
    Qwen,
    /// `reasoning_effort: "<level>"` (OpenAI)
    Effort,
    /// No control field; reasoning is implicit in the model (DeepSeek)
    None,
}

/// Per-endpoint differences inside the OpenAI-compatible family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenAiCompat {
    pub thinking: ThinkingFormat,
    /// Send `max_completion_tokens` instead of `max_tokens`
    pub max_completion_tokens: bool,
    /// Send the system prompt with the `developer` role
    pub developer_role: bool,
    /// Send `store: false`
    pub store: bool,
    /// Ask for usage in the final stream chunk
    pub usage_in_streaming: bool,
    /// Replay earlier reasoning on assistant messages
    pub replay_reasoning: bool,
}

impl OpenAiCompat {
    /// Detect the dialect from the provider tag and base URL.
    pub fn detect(model: &ModelDescriptor) -> Self {
        let url = model.base_url.as_str();
        let is_zai = model.provider == "zai" || url.contains("api.z.ai") || url.contains("bigmodel.cn");
        let is_qwen = model.provider == "dashscope" || url.contains("dashscope");
        let is_deepseek = model.provider == "deepseek" || url.contains("deepseek.com");
        let is_openai = model.provider == "openai" || url.contains("api.openai.com");

        let thinking = if is_zai {
            ThinkingFormat::Zai
        } else if is_qwen {
            ThinkingFormat::Qwen
        } else if is_deepseek {
            ThinkingFormat::None
        } else {
            ThinkingFormat::Effort
        };

        Self {
            thinking,
            max_completion_tokens: is_openai,
            developer_role: is_openai && model.reasoning,
            store: is_openai,
            usage_in_streaming: true,
            replay_reasoning: is_zai,
        }
    }
}

/// Build the request body for an OpenAI-compatible endpoint.
pub(crate) fn build_body(
    model: &ModelDescriptor,
    request: &CompletionRequest,
    options: &StreamOptions,
    reasoning: Reasoning,
) -> Result<Value, serde_json::Error> {
    let compat = OpenAiCompat::detect(model);
    let max_tokens = payload::max_tokens(model, options);

    let mut body = ChatRequest {
        model: model.id.clone(),
        messages: convert_messages(model, &compat, request),
        stream: true,
        stream_options: compat
            .usage_in_streaming
            .then_some(ChatStreamOptions { include_usage: true }),
        max_tokens: (!compat.max_completion_tokens).then_some(max_tokens),
        max_completion_tokens: compat.max_completion_tokens.then_some(max_tokens),
        temperature: options.temperature,
        store: compat.store.then_some(false),
        tools: (!request.tools.is_empty()).then(|| convert_tools(&request.tools)),
        thinking: None,
        enable_thinking: None,
        reasoning_effort: None,
    };

    if reasoning.capable {
        match compat.thinking {
            ThinkingFormat::Zai => {
                body.thinking = Some(if reasoning.enabled() {
                    ZaiThinking {
                        kind: "enabled",
                        clear_history: reasoning.preserve.then_some(false),
                    }
                } else {
                    ZaiThinking {
                        kind: "disabled",
                        clear_history: None,
                    }
                });
            }
            ThinkingFormat::Qwen => body.enable_thinking = Some(reasoning.enabled()),
            ThinkingFormat::Effort => {
                body.reasoning_effort = reasoning.enabled().then(|| effort_level(reasoning.effort));
            }
            ThinkingFormat::None => {}
        }
    }

    serde_json::to_value(body)
}

fn effort_level(effort: ReasoningEffort) -> &'static str {
    match effort {
        ReasoningEffort::XHigh => "high",
        other => other.as_str(),
    }
}

fn convert_messages(
    model: &ModelDescriptor,
    compat: &OpenAiCompat,
    request: &CompletionRequest,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(ref system) = request.system {
        let role = if compat.developer_role { "developer" } else { "system" };
        messages.push(ChatMessage::new(role, Some(ChatContent::Text(system.clone()))));
    }

    for message in &request.messages {
        let converted = match message.role {
            Role::User => convert_user(model, message),
            Role::Assistant => convert_assistant(compat, message),
            Role::Tool => convert_tool_result(message),
        };
        messages.extend(converted);
    }

    messages
}

fn convert_user(model: &ModelDescriptor, message: &Message) -> Option<ChatMessage> {
    let parts = match &message.content {
        Content::Text(text) => {
            return Some(ChatMessage::new("user", Some(ChatContent::Text(text.clone()))));
        }
        Content::Parts(parts) => parts,
    };

    let mut converted = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            ContentPart::Text { text } => converted.push(ChatContentPart::Text { text: text.clone() }),
            ContentPart::Image { source } => {
                if !model.accepts(InputModality::Image) {
                    warn!(model = %model.qualified_id(), "Dropping image for text-only model");
                    continue;
                }
                let url = match source {
                    ImageSource::Base64 { media_type, data } => {
                        format!("data:{};base64,{}", media_type, data)
                    }
                    ImageSource::Url { url } => url.clone(),
                };
                converted.push(ChatContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                });
            }
            _ => {}
        }
    }

    if converted.is_empty() {
        return None;
    }
    Some(ChatMessage::new("user", Some(ChatContent::Parts(converted))))
}

fn convert_assistant(compat: &OpenAiCompat, message: &Message) -> Option<ChatMessage> {
    let text = message.content.as_text();
    let mut converted = ChatMessage::new("assistant", (!text.is_empty()).then(|| ChatContent::Text(text)));

    if !message.tool_calls.is_empty() {
        converted.tool_calls = Some(
            message
                .tool_calls
                .iter()
                .map(|tc| ChatToolCall {
                    id: tc.id.clone(),
                    kind: "function",
                    function: ChatFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect(),
        );
    }

    if compat.replay_reasoning {
        for part in message.content.parts() {
            if let ContentPart::Thinking { thinking, signature } = part {
                if thinking.is_empty() {
                    continue;
                }
                let field = signature
                    .filter(|s| REASONING_FIELDS.contains(&s.as_str()))
                    .unwrap_or_else(|| REASONING_FIELDS[0].to_string());
                converted.reasoning.entry(field).or_default().push_str(&thinking);
            }
        }
    }

    if converted.content.is_none() && converted.tool_calls.is_none() && converted.reasoning.is_empty() {
        return None;
    }
    Some(converted)
}

fn convert_tool_result(message: &Message) -> Option<ChatMessage> {
    let Content::Parts(parts) = &message.content else {
        return None;
    };
    parts.iter().find_map(|p| match p {
        ContentPart::ToolResult {
            tool_use_id, content, ..
        } => {
            let mut converted = ChatMessage::new("tool", Some(ChatContent::Text(content.clone())));
            converted.tool_call_id = Some(tool_use_id.clone());
            Some(converted)
        }
        _ => None,
    })
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<ChatTool> {
    tools
        .iter()
        .map(|t| ChatTool {
            kind: "function",
            function: ChatFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

/// Stream decoder for Chat Completions chunks.
pub struct OpenAiDecoder {
    provider: String,
    /// Number of tool calls seen, for endpoints that omit the call index
    tool_calls_seen: u32,
}

impl OpenAiDecoder {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            tool_calls_seen: 0,
        }
    }

    fn tool_index(&mut self, call: &ChunkToolCall) -> u32 {
        match call.index {
            Some(index) => {
                self.tool_calls_seen = self.tool_calls_seen.max(index + 1);
                index
            }
            None if call.id.is_some() => {
                self.tool_calls_seen += 1;
                self.tool_calls_seen - 1
            }
            None => self.tool_calls_seen.saturating_sub(1),
        }
    }
}

impl ChunkDecoder for OpenAiDecoder {
    fn decode(&mut self, raw: &Value) -> Result<Option<ProviderChunk>, ProviderError> {
        let chunk = ChatChunk::deserialize(raw)
            .map_err(|e| ProviderError::malformed(&self.provider, e.to_string()))?;

        if let Some(error) = chunk.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ProviderError::transport(&self.provider, message));
        }

        let mut out = ProviderChunk {
            usage: chunk.usage.map(ChunkUsage::normalize),
            ..Default::default()
        };

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(delta) = choice.delta {
                let reasoning = [
                    (REASONING_FIELDS[0], delta.reasoning_content),
                    (REASONING_FIELDS[1], delta.reasoning),
                    (REASONING_FIELDS[2], delta.reasoning_text),
                ]
                .into_iter()
                .find_map(|(field, text)| text.filter(|t| !t.is_empty()).map(|t| (field, t)));

                if let Some((field, text)) = reasoning {
                    out.deltas.push(Delta::Thinking {
                        text,
                        field: Some(field.to_string()),
                    });
                }
                if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                    out.deltas.push(Delta::Text(text));
                }
                for call in delta.tool_calls.unwrap_or_default() {
                    let index = self.tool_index(&call);
                    let (name, arguments) = match call.function {
                        Some(f) => (f.name, f.arguments),
                        None => (None, None),
                    };
                    out.deltas.push(Delta::ToolCall(ToolCallFragment {
                        index,
                        id: call.id,
                        name,
                        arguments,
                    }));
                }
            }
            out.finish_reason = choice.finish_reason.as_deref().map(map_finish_reason);
        }

        Ok((!out.is_empty()).then_some(out))
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::MaxTokens,
        "tool_calls" | "function_call" => FinishReason::ToolUse,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// Request types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<ChatStreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ZaiThinking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_thinking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ChatStreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct ZaiThinking {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    clear_history: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<ChatContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    /// Replayed reasoning, keyed by the field it arrived in
    #[serde(flatten)]
    reasoning: BTreeMap<String, String>,
}

impl ChatMessage {
    fn new(role: &'static str, content: Option<ChatContent>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            reasoning: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ChatContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ChatContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunctionCall,
}

#[derive(Debug, Serialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

// Streaming types

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
    usage: Option<ChunkUsage>,
    error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
    reasoning: Option<String>,
    reasoning_text: Option<String>,
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkToolCall {
    index: Option<u32>,
    id: Option<String>,
    function: Option<ChunkFunction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    prompt_tokens_details: Option<PromptTokensDetails>,
    completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PromptTokensDetails {
    cached_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompletionTokensDetails {
    reasoning_tokens: Option<u32>,
}

impl ChunkUsage {
    fn normalize(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens.unwrap_or(0),
            completion_tokens: self.completion_tokens.unwrap_or(0),
            cached_tokens: self
                .prompt_tokens_details
                .and_then(|d| d.cached_tokens)
                .unwrap_or(0),
            cache_write_tokens: 0,
            reasoning_tokens: self
                .completion_tokens_details
                .and_then(|d| d.reasoning_tokens)
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tessera_core::{ToolCall, WireApi};

    use super::*;
    use crate::registry::ModelRegistry;

    fn body_for(provider: &str, id: &str, request: &CompletionRequest, options: &StreamOptions) -> Value {
        let registry = ModelRegistry::builtin();
        let model = registry.resolve(provider, id).unwrap();
        let reasoning = Reasoning {
            capable: model.reasoning,
            effort: if model.reasoning { options.reasoning } else { ReasoningEffort::Off },
            preserve: model.reasoning && options.preserve_thinking,
        };
        build_body(model, request, options, reasoning).unwrap()
    }

    fn hello() -> CompletionRequest {
        CompletionRequest::new(vec![Message::user("hello")])
    }

    #[test]
    fn test_detect_dialects() {
        let registry = ModelRegistry::builtin();
        let detect = |p: &str, id: &str| OpenAiCompat::detect(registry.resolve(p, id).unwrap());

        assert_eq!(detect("zai", "glm-5").thinking, ThinkingFormat::Zai);
        assert_eq!(detect("dashscope", "qwen-plus").thinking, ThinkingFormat::Qwen);
        assert_eq!(detect("deepseek", "deepseek-reasoner").thinking, ThinkingFormat::None);

        let openai = detect("openai", "o4-mini");
        assert_eq!(openai.thinking, ThinkingFormat::Effort);
        assert!(openai.max_completion_tokens);
        assert!(openai.developer_role);
        assert!(openai.store);
        assert!(!openai.replay_reasoning);
    }

    #[test]
    fn test_detect_zai_by_base_url() {
        let model = ModelDescriptor::new(
            "custom",
            "glm-4.6",
            WireApi::OpenAiCompletions,
            "https://open.bigmodel.cn/api/paas/v4",
        )
        .with_reasoning(true);
        let compat = OpenAiCompat::detect(&model);
        assert_eq!(compat.thinking, ThinkingFormat::Zai);
        assert!(!compat.store);
    }

    #[test]
    fn test_zai_reasoning_off_disables_thinking() {
        let options = StreamOptions::new().with_reasoning(ReasoningEffort::Off);
        let body = body_for("zai", "glm-4.6", &hello(), &options);
        assert_eq!(body["thinking"], json!({"type": "disabled"}));
    }

    #[test]
    fn test_qwen_enable_thinking() {
        let options = StreamOptions::new().with_reasoning(ReasoningEffort::Low);
        let body = body_for("dashscope", "qwen-plus", &hello(), &options);
        assert_eq!(body["enable_thinking"], json!(true));
        assert!(body.get("thinking").is_none());
        assert!(body.get("reasoning_effort").is_none());

        let plain = body_for("dashscope", "qwen3-coder-plus", &hello(), &options);
        assert!(plain.get("enable_thinking").is_none());
    }

    #[test]
    fn test_openai_effort_and_token_field() {
        let options = StreamOptions::new().with_reasoning(ReasoningEffort::XHigh);
        let body = body_for("openai", "o4-mini", &hello(), &options);
        assert_eq!(body["reasoning_effort"], "high");
        assert_eq!(body["max_completion_tokens"], 32_000);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["store"], false);
        assert_eq!(body["stream_options"], json!({"include_usage": true}));
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn test_openai_developer_role_for_reasoning_models() {
        let request = hello().with_system("be brief");
        let reasoning = body_for("openai", "gpt-5", &request, &StreamOptions::new());
        assert_eq!(reasoning["messages"][0]["role"], "developer");
        let plain = body_for("openai", "gpt-4o", &request, &StreamOptions::new());
        assert_eq!(plain["messages"][0]["role"], "system");
    }

    #[test]
    fn test_deepseek_emits_no_reasoning_control() {
        let options = StreamOptions::new().with_reasoning(ReasoningEffort::High);
        let body = body_for("deepseek", "deepseek-reasoner", &hello(), &options);
        let object = body.as_object().unwrap();
        for key in ["thinking", "enable_thinking", "reasoning_effort", "store"] {
            assert!(!object.contains_key(key), "unexpected field {}", key);
        }
        assert_eq!(body["max_tokens"], 32_000);
    }

    #[test]
    fn test_max_tokens_capped_by_model() {
        let options = StreamOptions::new().with_max_tokens(1_000_000);
        let body = body_for("deepseek", "deepseek-chat", &hello(), &options);
        assert_eq!(body["max_tokens"], 8_192);
    }

    #[test]
    fn test_zai_replays_reasoning_in_original_field() {
        let assistant = Message::assistant_with_parts(
            vec![
                ContentPart::Thinking {
                    thinking: "The user greets me.".into(),
                    signature: Some("reasoning_content".into()),
                },
                ContentPart::Text { text: "Hi!".into() },
            ],
            vec![],
        );
        let request = CompletionRequest::new(vec![
            Message::user("hello"),
            assistant,
            Message::user("again"),
        ]);

        let zai = body_for("zai", "glm-5", &request, &StreamOptions::new());
        assert_eq!(zai["messages"][1]["reasoning_content"], "The user greets me.");
        assert_eq!(zai["messages"][1]["content"], "Hi!");

        let deepseek = body_for("deepseek", "deepseek-reasoner", &request, &StreamOptions::new());
        assert!(deepseek["messages"][1].get("reasoning_content").is_none());
    }

    #[test]
    fn test_tool_round_trip_messages() {
        let call = ToolCall::new("call_1", "read_file", json!({"path": "a.rs"}));
        let request = CompletionRequest::new(vec![
            Message::user("read a.rs"),
            Message::assistant_with_parts(vec![], vec![call]),
            Message::tool_result("call_1".into(), "fn main() {}", false),
        ])
        .with_tools(vec![ToolDefinition::new("read_file", "Read a file")]);

        let body = body_for("openai", "gpt-4o", &request, &StreamOptions::new());
        let assistant = &body["messages"][1];
        assert!(assistant.get("content").is_none());
        assert_eq!(assistant["tool_calls"][0]["function"]["name"], "read_file");
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], r#"{"path":"a.rs"}"#);
        assert_eq!(body["messages"][2]["role"], "tool");
        assert_eq!(body["messages"][2]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["type"], "function");
    }

    #[test]
    fn test_images_dropped_for_text_only_model() {
        let request = CompletionRequest::new(vec![Message::user_with_parts(vec![
            ContentPart::Text { text: "what is this".into() },
            ContentPart::Image {
                source: ImageSource::Base64 {
                    media_type: "image/png".into(),
                    data: "AAAA".into(),
                },
            },
        ])]);

        let text_only = body_for("zai", "glm-5", &request, &StreamOptions::new());
        let parts = text_only["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 1);

        let vision = body_for("zai", "glm-4.5v", &request, &StreamOptions::new());
        let parts = vision["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_decode_text_and_reasoning() {
        let mut decoder = OpenAiDecoder::new("zai");
        let chunk = decoder
            .decode(&json!({"choices": [{"delta": {"reasoning_content": "hmm", "content": "Hi"}}]}))
            .unwrap()
            .unwrap();
        assert_eq!(
            chunk.deltas,
            vec![
                Delta::Thinking {
                    text: "hmm".into(),
                    field: Some("reasoning_content".into())
                },
                Delta::Text("Hi".into()),
            ]
        );
        assert_eq!(chunk.finish_reason, None);
    }

    #[test]
    fn test_decode_first_non_empty_reasoning_field() {
        let mut decoder = OpenAiDecoder::new("openrouter");
        let chunk = decoder
            .decode(&json!({"choices": [{"delta": {"reasoning_content": "", "reasoning": "step"}}]}))
            .unwrap()
            .unwrap();
        assert_eq!(
            chunk.deltas,
            vec![Delta::Thinking {
                text: "step".into(),
                field: Some("reasoning".into())
            }]
        );
    }

    #[test]
    fn test_decode_finish_and_usage() {
        let mut decoder = OpenAiDecoder::new("zai");
        let chunk = decoder
            .decode(&json!({
                "choices": [{"delta": {}, "finish_reason": "stop"}],
                "usage": {
                    "prompt_tokens": 1,
                    "completion_tokens": 1,
                    "prompt_tokens_details": {"cached_tokens": 0},
                    "completion_tokens_details": {"reasoning_tokens": 0}
                }
            }))
            .unwrap()
            .unwrap();
        assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
        assert_eq!(
            chunk.usage,
            Some(Usage {
                prompt_tokens: 1,
                completion_tokens: 1,
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_decode_usage_without_details() {
        let mut decoder = OpenAiDecoder::new("deepseek");
        let chunk = decoder
            .decode(&json!({"choices": [], "usage": {"prompt_tokens": 12, "completion_tokens": 3}}))
            .unwrap()
            .unwrap();
        let usage = chunk.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.cached_tokens, 0);
        assert_eq!(usage.reasoning_tokens, 0);
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason("stop"), FinishReason::Stop);
        assert_eq!(map_finish_reason("length"), FinishReason::MaxTokens);
        assert_eq!(map_finish_reason("tool_calls"), FinishReason::ToolUse);
        assert_eq!(map_finish_reason("function_call"), FinishReason::ToolUse);
        assert_eq!(map_finish_reason("content_filter"), FinishReason::ContentFilter);
        assert_eq!(map_finish_reason("something_new"), FinishReason::Stop);
    }

    #[test]
    fn test_tool_index_fallback() {
        let mut decoder = OpenAiDecoder::new("custom");
        let first = decoder
            .decode(&json!({"choices": [{"delta": {"tool_calls": [
                {"id": "a", "function": {"name": "one", "arguments": ""}}
            ]}}]}))
            .unwrap()
            .unwrap();
        let more = decoder
            .decode(&json!({"choices": [{"delta": {"tool_calls": [
                {"function": {"arguments": "{}"}}
            ]}}]}))
            .unwrap()
            .unwrap();
        let second = decoder
            .decode(&json!({"choices": [{"delta": {"tool_calls": [
                {"id": "b", "function": {"name": "two"}}
            ]}}]}))
            .unwrap()
            .unwrap();

        let index = |chunk: &ProviderChunk| match &chunk.deltas[0] {
            Delta::ToolCall(fragment) => fragment.index,
            other => panic!("unexpected delta {:?}", other),
        };
        assert_eq!(index(&first), 0);
        assert_eq!(index(&more), 0);
        assert_eq!(index(&second), 1);
    }

    #[test]
    fn test_keepalive_chunk_is_empty() {
        let mut decoder = OpenAiDecoder::new("openai");
        assert_eq!(decoder.decode(&json!({"choices": [{"delta": {"content": ""}}]})).unwrap(), None);
    }

    #[test]
    fn test_error_chunk_is_transport_error() {
        let mut decoder = OpenAiDecoder::new("zai");
        let err = decoder
            .decode(&json!({"error": {"message": "overloaded", "code": "1305"}}))
            .unwrap_err();
        assert_eq!(err, ProviderError::transport("zai", "overloaded"));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let mut decoder = OpenAiDecoder::new("zai");
        let err = decoder.decode(&json!({"choices": "nope"})).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedChunk { .. }));
        assert!(decoder.decode(&json!(42)).is_err());
    }
}
