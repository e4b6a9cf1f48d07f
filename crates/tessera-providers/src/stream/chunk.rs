//! Normalized chunks shared by every wire-protocol family.

use serde_json::Value;
use tessera_core::{ModelDescriptor, ProviderError, WireApi};

use crate::types::{FinishReason, Usage};
use crate::{anthropic, openai};

/// One fragment of a tool call, keyed by call index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// A single delta inside a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Text(String),
    /// Reasoning text; `field` names the payload field it arrived in
    Thinking {
        text: String,
        field: Option<String>,
    },
    /// Opaque signature covering the reasoning trace
    ThinkingSignature(String),
    ToolCall(ToolCallFragment),
}

/// A decoded raw chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderChunk {
    pub deltas: Vec<Delta>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
}

impl ProviderChunk {
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.finish_reason.is_none() && self.usage.is_none()
    }
}

/// Turns a family's raw JSON chunks into [`ProviderChunk`]s.
///
/// Decoders may keep state between chunks. `Ok(None)` means the chunk
/// carried nothing of interest (keep-alives, bookkeeping events).
pub trait ChunkDecoder: Send {
    fn decode(&mut self, raw: &Value) -> Result<Option<ProviderChunk>, ProviderError>;
}

/// Decoder for the model's wire-protocol family.
pub fn decoder_for(model: &ModelDescriptor) -> Box<dyn ChunkDecoder> {
    match model.api {
        WireApi::OpenAiCompletions => Box::new(openai::OpenAiDecoder::new(&model.provider)),
        WireApi::AnthropicMessages => Box::new(anthropic::AnthropicDecoder::new(&model.provider)),
    }
}
