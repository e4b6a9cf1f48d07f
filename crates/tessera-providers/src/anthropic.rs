//! Anthropic Messages family.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use tessera_core::message::ImageSource;
use tessera_core::{
    Content, ContentPart, InputModality, Message, ModelDescriptor, ProviderError, ReasoningEffort,
    Role, ToolDefinition,
};

use crate::options::StreamOptions;
use crate::payload::{self, Reasoning};
use crate::stream::{ChunkDecoder, Delta, ProviderChunk, ToolCallFragment};
use crate::types::{CompletionRequest, FinishReason, Usage};

/// Smallest thinking budget the API accepts.
const MIN_THINKING_BUDGET: u32 = 1024;

/// Thinking budget in tokens for an effort level.
pub fn thinking_budget(effort: ReasoningEffort) -> u32 {
    match effort {
        ReasoningEffort::Off => 0,
        ReasoningEffort::Minimal => 1024,
        ReasoningEffort::Low => 2048,
        ReasoningEffort::Medium => 8192,
        ReasoningEffort::High => 16384,
        ReasoningEffort::XHigh => 32768,
    }
}

/// Build the request body for the Messages API.
pub(crate) fn build_body(
    model: &ModelDescriptor,
    request: &CompletionRequest,
    options: &StreamOptions,
    reasoning: Reasoning,
) -> Result<Value, serde_json::Error> {
    let mut max_tokens = payload::max_tokens(model, options);
    let mut thinking = None;

    if reasoning.enabled() {
        max_tokens = max_tokens
            .saturating_add(thinking_budget(reasoning.effort))
            .min(model.max_tokens);
        let mut budget = thinking_budget(reasoning.effort);
        if budget >= max_tokens {
            budget = max_tokens
                .saturating_sub(MIN_THINKING_BUDGET)
                .max(MIN_THINKING_BUDGET);
        }
        thinking = Some(AnthropicThinking {
            kind: "enabled",
            budget_tokens: budget,
        });
    }

    let body = AnthropicRequest {
        model: model.id.clone(),
        messages: convert_messages(model, &request.messages),
        system: request.system.clone(),
        max_tokens,
        // Temperature is rejected while thinking is on.
        temperature: options.temperature.filter(|_| thinking.is_none()),
        tools: (!request.tools.is_empty()).then(|| convert_tools(&request.tools)),
        thinking,
        stream: true,
    };

    serde_json::to_value(body)
}

fn convert_messages(model: &ModelDescriptor, messages: &[Message]) -> Vec<AnthropicMessage> {
    let mut converted: Vec<AnthropicMessage> = Vec::with_capacity(messages.len());

    for message in messages {
        let content = match message.role {
            Role::User => convert_user_content(model, &message.content),
            Role::Assistant => convert_assistant_content(message),
            Role::Tool => convert_tool_results(&message.content),
        };
        if content.is_empty() {
            continue;
        }

        // Consecutive tool results go back in a single user turn.
        if message.role == Role::Tool {
            if let Some(last) = converted.last_mut() {
                if last.role == "user"
                    && matches!(last.content.last(), Some(AnthropicContent::ToolResult { .. }))
                {
                    last.content.extend(content);
                    continue;
                }
            }
        }

        let role = match message.role {
            Role::User | Role::Tool => "user",
            Role::Assistant => "assistant",
        };
        converted.push(AnthropicMessage { role, content });
    }

    converted
}

fn convert_user_content(model: &ModelDescriptor, content: &Content) -> Vec<AnthropicContent> {
    let parts = match content {
        Content::Text(text) => return vec![AnthropicContent::Text { text: text.clone() }],
        Content::Parts(parts) => parts,
    };

    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(AnthropicContent::Text { text: text.clone() }),
            ContentPart::Image { source } => {
                if !model.accepts(InputModality::Image) {
                    warn!(model = %model.qualified_id(), "Dropping image for text-only model");
                    return None;
                }
                match source {
                    ImageSource::Base64 { media_type, data } => Some(AnthropicContent::Image {
                        source: AnthropicImageSource {
                            kind: "base64",
                            media_type: media_type.clone(),
                            data: data.clone(),
                        },
                    }),
                    ImageSource::Url { url } => {
                        debug!("URL images not directly supported, skipping: {}", url);
                        None
                    }
                }
            }
            _ => None,
        })
        .collect()
}

fn convert_assistant_content(message: &Message) -> Vec<AnthropicContent> {
    let mut content = Vec::new();

    for part in message.content.parts() {
        match part {
            ContentPart::Thinking { thinking, signature } if !thinking.is_empty() => {
                match signature.filter(|s| !s.is_empty()) {
                    Some(signature) => content.push(AnthropicContent::Thinking { thinking, signature }),
                    // Unsigned traces are not accepted back as thinking.
                    None => content.push(AnthropicContent::Text { text: thinking }),
                }
            }
            ContentPart::Text { text } if !text.is_empty() => {
                content.push(AnthropicContent::Text { text });
            }
            _ => {}
        }
    }

    for call in &message.tool_calls {
        content.push(AnthropicContent::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.arguments.clone(),
        });
    }

    content
}

fn convert_tool_results(content: &Content) -> Vec<AnthropicContent> {
    match content {
        Content::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some(AnthropicContent::ToolResult {
                    tool_use_id: tool_use_id.clone(),
                    content: content.clone(),
                    is_error: *is_error,
                }),
                _ => None,
            })
            .collect(),
        Content::Text(_) => vec![],
    }
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|t| AnthropicTool {
            name: t.name.clone(),
            description: t.description.clone(),
            input_schema: t.parameters.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum BlockKind {
    Text,
    Thinking,
    /// Tool use block with its tool call ordinal
    Tool(u32),
    Other,
}

/// Stream decoder for Messages API events.
///
/// Tracks the kind of each content block and the usage reported so far,
/// since deltas only carry the block index and usage arrives in two parts.
pub struct AnthropicDecoder {
    provider: String,
    blocks: HashMap<u32, BlockKind>,
    tool_calls: u32,
    usage: Usage,
}

impl AnthropicDecoder {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            blocks: HashMap::new(),
            tool_calls: 0,
            usage: Usage::default(),
        }
    }

    fn merge_usage(&mut self, usage: &EventUsage) {
        if let Some(output) = usage.output_tokens {
            self.usage.completion_tokens = output;
        }
        let cache_read = usage.cache_read_input_tokens;
        let cache_write = usage.cache_creation_input_tokens;
        if usage.input_tokens.is_some() || cache_read.is_some() || cache_write.is_some() {
            let uncached = usage
                .input_tokens
                .unwrap_or_else(|| {
                    self.usage
                        .prompt_tokens
                        .saturating_sub(self.usage.cached_tokens)
                        .saturating_sub(self.usage.cache_write_tokens)
                });
            if let Some(read) = cache_read {
                self.usage.cached_tokens = read;
            }
            if let Some(write) = cache_write {
                self.usage.cache_write_tokens = write;
            }
            self.usage.prompt_tokens =
                uncached + self.usage.cached_tokens + self.usage.cache_write_tokens;
        }
    }

    fn block_start(&mut self, index: u32, block: ContentBlock) -> Option<Delta> {
        match block.kind.as_str() {
            "text" => {
                self.blocks.insert(index, BlockKind::Text);
                block.text.filter(|t| !t.is_empty()).map(Delta::Text)
            }
            "thinking" => {
                self.blocks.insert(index, BlockKind::Thinking);
                block
                    .thinking
                    .filter(|t| !t.is_empty())
                    .map(|text| Delta::Thinking { text, field: None })
            }
            "tool_use" => {
                let ordinal = self.tool_calls;
                self.tool_calls += 1;
                self.blocks.insert(index, BlockKind::Tool(ordinal));
                Some(Delta::ToolCall(ToolCallFragment {
                    index: ordinal,
                    id: block.id,
                    name: block.name,
                    arguments: None,
                }))
            }
            _ => {
                self.blocks.insert(index, BlockKind::Other);
                None
            }
        }
    }

    fn block_delta(&self, index: u32, delta: BlockDelta) -> Result<Option<Delta>, ProviderError> {
        let out = match delta.kind.as_str() {
            "text_delta" => delta.text.filter(|t| !t.is_empty()).map(Delta::Text),
            "thinking_delta" => delta
                .thinking
                .filter(|t| !t.is_empty())
                .map(|text| Delta::Thinking { text, field: None }),
            "signature_delta" => delta.signature.map(Delta::ThinkingSignature),
            "input_json_delta" => {
                let Some(BlockKind::Tool(ordinal)) = self.blocks.get(&index).copied() else {
                    return Err(ProviderError::malformed(
                        &self.provider,
                        format!("input_json_delta for block {} which is not a tool call", index),
                    ));
                };
                Some(Delta::ToolCall(ToolCallFragment {
                    index: ordinal,
                    id: None,
                    name: None,
                    arguments: delta.partial_json,
                }))
            }
            other => {
                debug!(delta_type = other, "Ignoring unknown content delta");
                None
            }
        };
        Ok(out)
    }
}

impl ChunkDecoder for AnthropicDecoder {
    fn decode(&mut self, raw: &Value) -> Result<Option<ProviderChunk>, ProviderError> {
        let event = StreamEvent::deserialize(raw)
            .map_err(|e| ProviderError::malformed(&self.provider, e.to_string()))?;

        let mut chunk = ProviderChunk::default();
        match event {
            StreamEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.merge_usage(&usage);
                    chunk.usage = Some(self.usage);
                }
            }
            StreamEvent::ContentBlockStart { index, content_block } => {
                chunk.deltas.extend(self.block_start(index, content_block));
            }
            StreamEvent::ContentBlockDelta { index, delta } => {
                chunk.deltas.extend(self.block_delta(index, delta)?);
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = usage {
                    self.merge_usage(&usage);
                }
                chunk.usage = Some(self.usage);
                chunk.finish_reason = delta.stop_reason.as_deref().map(map_stop_reason);
            }
            StreamEvent::Error { error } => {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                return Err(ProviderError::transport(&self.provider, message));
            }
            StreamEvent::ContentBlockStop | StreamEvent::MessageStop | StreamEvent::Ping => {}
            StreamEvent::Unknown => debug!("Ignoring unknown stream event"),
        }

        Ok((!chunk.is_empty()).then_some(chunk))
    }
}

fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::MaxTokens,
        "tool_use" => FinishReason::ToolUse,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<AnthropicThinking>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicThinking {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum AnthropicContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: AnthropicImageSource },
    #[serde(rename = "thinking")]
    Thinking { thinking: String, signature: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

// Streaming event types

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: StartMessage },
    #[serde(rename = "content_block_start")]
    ContentBlockStart { index: u32, content_block: ContentBlock },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: u32, delta: BlockDelta },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop,
    #[serde(rename = "message_delta")]
    MessageDelta {
        #[serde(default)]
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<EventUsage>,
    },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "error")]
    Error { error: Value },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StartMessage {
    usage: Option<EventUsage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
    cache_read_input_tokens: Option<u32>,
    cache_creation_input_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockDelta {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    partial_json: Option<String>,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}
