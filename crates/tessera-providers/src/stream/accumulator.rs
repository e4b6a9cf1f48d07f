//! Folds normalized chunks into a final [`Completion`].

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use tessera_core::{ModelDescriptor, ProviderError, ToolCall, WireApi};

use super::chunk::{Delta, ProviderChunk, ToolCallFragment};
use super::event::StreamEvent;
use crate::types::{Completion, FinishReason, ThinkingBlock, Usage};

/// Lifecycle of one stream.
///
/// `Finishing` is entered when a finish reason arrives without usage; the
/// stream then waits for a trailing usage chunk or the end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Finishing,
    Completed,
    Failed,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Accumulates the output of one stream.
#[derive(Debug)]
pub struct StreamAccumulator {
    provider: String,
    model: String,
    api: WireApi,
    state: StreamState,
    text: String,
    thinking: String,
    thinking_signature: Option<String>,
    /// Reasoning blocks closed by a signature
    thinking_blocks: Vec<ThinkingBlock>,
    /// Reasoning text since the last closed block
    open_block: String,
    open_field: Option<String>,
    tool_calls: BTreeMap<u32, PartialToolCall>,
    usage: Usage,
    usage_seen: bool,
    finish_reason: Option<FinishReason>,
}

impl StreamAccumulator {
    pub fn new(model: &ModelDescriptor) -> Self {
        Self {
            provider: model.provider.clone(),
            model: model.id.clone(),
            api: model.api,
            state: StreamState::Idle,
            text: String::new(),
            thinking: String::new(),
            thinking_signature: None,
            thinking_blocks: Vec::new(),
            open_block: String::new(),
            open_field: None,
            tool_calls: BTreeMap::new(),
            usage: Usage::default(),
            usage_seen: false,
            finish_reason: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Enter `Streaming` and return the start event.
    pub fn start(&mut self) -> StreamEvent {
        self.state = StreamState::Streaming;
        StreamEvent::Start {
            provider: self.provider.clone(),
            model: self.model.clone(),
        }
    }

    /// Apply one chunk, returning the events it produced.
    pub fn apply(&mut self, chunk: ProviderChunk) -> Vec<StreamEvent> {
        if let Some(usage) = chunk.usage {
            self.usage = usage;
            self.usage_seen = true;
        }

        match self.state {
            StreamState::Idle => self.state = StreamState::Streaming,
            StreamState::Streaming => {}
            StreamState::Finishing => {
                if !chunk.deltas.is_empty() {
                    debug!(provider = %self.provider, "Ignoring content after finish reason");
                }
                return Vec::new();
            }
            StreamState::Completed | StreamState::Failed => return Vec::new(),
        }

        let mut events = Vec::with_capacity(chunk.deltas.len());
        for delta in chunk.deltas {
            match delta {
                Delta::Text(text) => {
                    self.text.push_str(&text);
                    events.push(StreamEvent::TextDelta { delta: text });
                }
                Delta::Thinking { text, field } => {
                    self.thinking.push_str(&text);
                    self.open_block.push_str(&text);
                    if self.thinking_signature.is_none() {
                        self.thinking_signature = field.clone();
                    }
                    if self.open_field.is_none() {
                        self.open_field = field;
                    }
                    events.push(StreamEvent::ThinkingDelta { delta: text });
                }
                Delta::ThinkingSignature(signature) => {
                    // A signature covers the block it ends.
                    self.thinking_blocks.push(ThinkingBlock {
                        thinking: std::mem::take(&mut self.open_block),
                        signature: Some(signature.clone()),
                    });
                    self.open_field = None;
                    self.thinking_signature = Some(signature);
                }
                Delta::ToolCall(fragment) => self.apply_tool_fragment(fragment, &mut events),
            }
        }

        if let Some(reason) = chunk.finish_reason {
            self.finish_reason = Some(reason);
            self.state = StreamState::Finishing;
        }

        events
    }

    fn apply_tool_fragment(&mut self, fragment: ToolCallFragment, events: &mut Vec<StreamEvent>) {
        let index = fragment.index;
        let (call, is_new) = match self.tool_calls.entry(index) {
            Entry::Vacant(entry) => (entry.insert(PartialToolCall::default()), true),
            Entry::Occupied(entry) => (entry.into_mut(), false),
        };

        if call.id.is_none() {
            call.id = fragment.id;
        }
        if call.name.is_none() {
            call.name = fragment.name;
        }
        if is_new {
            events.push(StreamEvent::ToolCallStart {
                index,
                id: call.id.clone(),
                name: call.name.clone(),
            });
        }
        if let Some(arguments) = fragment.arguments.filter(|a| !a.is_empty()) {
            call.arguments.push_str(&arguments);
            events.push(StreamEvent::ToolCallDelta { index, arguments });
        }
    }

    /// A finish reason and usage have both arrived.
    pub fn ready_to_complete(&self) -> bool {
        self.state == StreamState::Finishing && self.usage_seen
    }

    /// Settle the stream successfully.
    pub fn complete(&mut self) -> Result<Completion, ProviderError> {
        let Some(finish_reason) = self.finish_reason else {
            return Err(self.fail(ProviderError::transport(
                &self.provider,
                "stream ended before a finish reason",
            )));
        };

        let mut tool_calls = Vec::with_capacity(self.tool_calls.len());
        for (index, call) in std::mem::take(&mut self.tool_calls) {
            let arguments = if call.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                match serde_json::from_str(&call.arguments) {
                    Ok(value) => value,
                    Err(e) => {
                        let message = format!("invalid arguments for tool call {}: {}", index, e);
                        return Err(self.fail(ProviderError::malformed(&self.provider, message)));
                    }
                }
            };
            tool_calls.push(ToolCall {
                id: call.id.unwrap_or_else(|| format!("call_{}", index)),
                name: call.name.unwrap_or_default(),
                arguments,
            });
        }

        let mut thinking_blocks = std::mem::take(&mut self.thinking_blocks);
        if !self.open_block.is_empty() {
            thinking_blocks.push(ThinkingBlock {
                thinking: std::mem::take(&mut self.open_block),
                signature: self.open_field.take(),
            });
        }

        self.state = StreamState::Completed;
        Ok(Completion {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api: self.api,
            text: std::mem::take(&mut self.text),
            thinking: std::mem::take(&mut self.thinking),
            thinking_signature: self.thinking_signature.take(),
            thinking_blocks,
            tool_calls,
            usage: self.usage,
            finish_reason,
        })
    }

    /// The raw stream ended.
    pub fn end_of_stream(&mut self) -> Result<Completion, ProviderError> {
        match self.state {
            StreamState::Finishing => self.complete(),
            _ => Err(self.fail(ProviderError::transport(
                &self.provider,
                "stream ended before a finish reason",
            ))),
        }
    }

    /// The raw stream broke with `error`.
    ///
    /// A stream that already has its finish reason keeps its answer and
    /// settles with the usage seen so far.
    pub fn interrupt(&mut self, error: ProviderError) -> Result<Completion, ProviderError> {
        if self.state == StreamState::Finishing {
            warn!(
                provider = %self.provider,
                kind = error.kind(),
                "Stream broke after its finish reason, keeping the answer: {}",
                error
            );
            return self.complete();
        }
        Err(self.fail(error))
    }

    /// Discard everything accumulated and enter `Failed`.
    pub fn fail(&mut self, error: ProviderError) -> ProviderError {
        self.state = StreamState::Failed;
        self.text.clear();
        self.thinking.clear();
        self.thinking_signature = None;
        self.thinking_blocks.clear();
        self.open_block.clear();
        self.open_field = None;
        self.tool_calls.clear();
        self.finish_reason = None;
        error
    }
}
