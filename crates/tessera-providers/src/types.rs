//! Provider-agnostic request and result types.

use serde::{Deserialize, Serialize};
use tessera_core::{ContentPart, Message, ModelCost, ToolCall, ToolDefinition, WireApi};

/// A conversation to complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System prompt
    pub system: Option<String>,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Available tools
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    /// Create a request from a message list.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            system: None,
            messages,
            tools: vec![],
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the available tools.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Reason the completion finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Normal completion
    Stop,
    /// Hit max tokens limit
    MaxTokens,
    /// Tool use requested
    ToolUse,
    /// Content was filtered or refused
    ContentFilter,
}

/// Token usage statistics.
///
/// `prompt_tokens` counts every input token, cached ones included;
/// `cached_tokens` and `cache_write_tokens` are the subsets read from and
/// written to the provider's prompt cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cached_tokens: u32,
    pub cache_write_tokens: u32,
    pub reasoning_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    /// Cost in USD under the given price table.
    pub fn cost(&self, cost: &ModelCost) -> f64 {
        let uncached = self
            .prompt_tokens
            .saturating_sub(self.cached_tokens)
            .saturating_sub(self.cache_write_tokens);
        (f64::from(uncached) * cost.input
            + f64::from(self.cached_tokens) * cost.cache_read
            + f64::from(self.cache_write_tokens) * cost.cache_write
            + f64::from(self.completion_tokens) * cost.output)
            / 1_000_000.0
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.cached_tokens = self.cached_tokens.saturating_add(other.cached_tokens);
        self.cache_write_tokens = self.cache_write_tokens.saturating_add(other.cache_write_tokens);
        self.reasoning_tokens = self.reasoning_tokens.saturating_add(other.reasoning_tokens);
    }
}

/// One reasoning block and the signature that covers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingBlock {
    pub thinking: String,
    pub signature: Option<String>,
}

/// Final aggregated result of one streamed completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub provider: String,
    pub model: String,
    pub api: WireApi,
    /// Visible text
    pub text: String,
    /// Reasoning text; empty when the model produced none
    pub thinking: String,
    /// What the provider needs to accept the reasoning back on a later turn
    pub thinking_signature: Option<String>,
    /// Reasoning split into blocks, each with its own signature
    #[serde(default)]
    pub thinking_blocks: Vec<ThinkingBlock>,
    /// Tool calls, ordered by call index
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
    pub finish_reason: FinishReason,
}

impl Completion {
    /// Assistant message for appending to the conversation.
    pub fn to_message(&self) -> Message {
        let mut parts = Vec::new();
        if !self.thinking_blocks.is_empty() {
            parts.extend(
                self.thinking_blocks
                    .iter()
                    .filter(|b| !b.thinking.is_empty())
                    .map(|b| ContentPart::Thinking {
                        thinking: b.thinking.clone(),
                        signature: b.signature.clone(),
                    }),
            );
        } else if !self.thinking.is_empty() {
            parts.push(ContentPart::Thinking {
                thinking: self.thinking.clone(),
                signature: self.thinking_signature.clone(),
            });
        }
        if !self.text.is_empty() {
            parts.push(ContentPart::Text {
                text: self.text.clone(),
            });
        }
        Message::assistant_with_parts(parts, self.tool_calls.clone())
    }
}
