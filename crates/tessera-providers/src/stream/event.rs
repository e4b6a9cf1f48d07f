//! Events observed by the consumer of a stream.

use tessera_core::ProviderError;

use crate::types::Completion;

/// A normalized streaming event.
///
/// Every stream starts with [`StreamEvent::Start`] and, unless the consumer
/// stops reading, ends with exactly one of [`StreamEvent::Done`] or
/// [`StreamEvent::Error`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start {
        provider: String,
        model: String,
    },
    TextDelta {
        delta: String,
    },
    ThinkingDelta {
        delta: String,
    },
    /// First fragment of a tool call
    ToolCallStart {
        index: u32,
        id: Option<String>,
        name: Option<String>,
    },
    /// Raw argument JSON fragment
    ToolCallDelta {
        index: u32,
        arguments: String,
    },
    Done {
        completion: Completion,
    },
    Error {
        error: ProviderError,
    },
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
