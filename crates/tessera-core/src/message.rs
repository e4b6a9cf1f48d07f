//! Message and conversation primitives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::ToolCall;

/// Role in a conversation.
///
/// System instructions travel separately on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool result
    Tool,
}

/// Message content types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text content
    Text(String),
    /// Multiple content parts (multimodal, reasoning traces, tool results)
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Create text content.
    pub fn text(s: impl Into<String>) -> Self {
        Content::Text(s.into())
    }

    /// Visible text only; reasoning traces are excluded.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Content as a list of parts.
    pub fn parts(&self) -> Vec<ContentPart> {
        match self {
            Content::Text(s) if s.is_empty() => vec![],
            Content::Text(s) => vec![ContentPart::Text { text: s.clone() }],
            Content::Parts(parts) => parts.clone(),
        }
    }
}

/// Content part for multimodal messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    /// Text content
    #[serde(rename = "text")]
    Text { text: String },
    /// Image content
    #[serde(rename = "image")]
    Image { source: ImageSource },
    /// Reasoning trace produced by the model on an earlier turn.
    ///
    /// `signature` is whatever the provider needs to accept the trace back:
    /// an opaque signature for Anthropic, or the name of the field the trace
    /// arrived in for OpenAI-compatible dialects.
    #[serde(rename = "thinking")]
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Tool result
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// Image source for multimodal content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ImageSource {
    /// Base64-encoded image
    #[serde(rename = "base64")]
    Base64 { media_type: String, data: String },
    /// URL reference
    #[serde(rename = "url")]
    Url { url: String },
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,
    /// Message role
    pub role: Role,
    /// Message content
    pub content: Content,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Tool calls in this message (for assistant messages)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    fn with_role(role: Role, content: Content) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            tool_calls: vec![],
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Content::text(content))
    }

    /// Create a user message from parts (text and images).
    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        Self::with_role(Role::User, Content::Parts(parts))
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Content::text(content))
    }

    /// Create an assistant message from parts, with optional tool calls.
    pub fn assistant_with_parts(parts: Vec<ContentPart>, tool_calls: Vec<ToolCall>) -> Self {
        let mut message = Self::with_role(Role::Assistant, Content::Parts(parts));
        message.tool_calls = tool_calls;
        message
    }

    /// Create a tool result message.
    pub fn tool_result(tool_use_id: String, content: impl Into<String>, is_error: bool) -> Self {
        Self::with_role(
            Role::Tool,
            Content::Parts(vec![ContentPart::ToolResult {
                tool_use_id,
                content: content.into(),
                is_error,
            }]),
        )
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Concatenated reasoning trace, if the message carries one.
    pub fn thinking(&self) -> Option<String> {
        let Content::Parts(parts) = &self.content else {
            return None;
        };
        let traces: Vec<&str> = parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Thinking { thinking, .. } if !thinking.is_empty() => {
                    Some(thinking.as_str())
                }
                _ => None,
            })
            .collect();
        if traces.is_empty() {
            None
        } else {
            Some(traces.join("\n"))
        }
    }

    /// Copy of this message with reasoning traces removed.
    pub fn without_thinking(&self) -> Self {
        let mut message = self.clone();
        if let Content::Parts(parts) = &mut message.content {
            parts.retain(|p| !matches!(p, ContentPart::Thinking { .. }));
        }
        message
    }

    /// Tool call ID for tool result messages.
    pub fn tool_use_id(&self) -> Option<&str> {
        match &self.content {
            Content::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            }),
            Content::Text(_) => None,
        }
    }
}
