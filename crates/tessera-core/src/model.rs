//! Model descriptors and reasoning levels.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wire-protocol family: providers sharing one request/chunk schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireApi {
    /// OpenAI `/chat/completions` and compatible endpoints
    #[serde(rename = "openai-completions")]
    OpenAiCompletions,
    /// Anthropic `/messages`
    #[serde(rename = "anthropic-messages")]
    AnthropicMessages,
}

impl WireApi {
    /// Stable name used in catalogs and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            WireApi::OpenAiCompletions => "openai-completions",
            WireApi::AnthropicMessages => "anthropic-messages",
        }
    }
}

impl fmt::Display for WireApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input modality accepted by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputModality {
    Text,
    Image,
}

/// Unit prices in USD per million tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
}

/// Immutable description of one model in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier sent on the wire
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Provider tag
    pub provider: String,
    /// Wire-protocol family
    pub api: WireApi,
    /// Base endpoint, without the family-specific path
    pub base_url: String,
    /// Whether the model exposes a reasoning channel
    pub reasoning: bool,
    /// Accepted input modalities
    pub input: BTreeSet<InputModality>,
    /// Context window size in tokens
    pub context_window: u32,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Pricing table
    pub cost: ModelCost,
}

impl ModelDescriptor {
    /// Create a text-only, non-reasoning descriptor.
    pub fn new(
        provider: impl Into<String>,
        id: impl Into<String>,
        api: WireApi,
        base_url: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider: provider.into(),
            api,
            base_url: base_url.into(),
            reasoning: false,
            input: BTreeSet::from([InputModality::Text]),
            context_window: 128_000,
            max_tokens: 4_096,
            cost: ModelCost::default(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark the model as reasoning-capable.
    pub fn with_reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Accept image input in addition to text.
    pub fn with_images(mut self) -> Self {
        self.input.insert(InputModality::Image);
        self
    }

    /// Set context window and output limits.
    pub fn with_limits(mut self, context_window: u32, max_tokens: u32) -> Self {
        self.context_window = context_window;
        self.max_tokens = max_tokens;
        self
    }

    /// Set the pricing table.
    pub fn with_cost(mut self, input: f64, output: f64, cache_read: f64, cache_write: f64) -> Self {
        self.cost = ModelCost {
            input,
            output,
            cache_read,
            cache_write,
        };
        self
    }

    /// Whether the model accepts the given input modality.
    pub fn accepts(&self, modality: InputModality) -> bool {
        self.input.contains(&modality)
    }

    /// `provider/id` form used in logs and CLI output.
    pub fn qualified_id(&self) -> String {
        format!("{}/{}", self.provider, self.id)
    }
}

/// Requested reasoning effort, ordered from none to most.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    #[default]
    Off,
    Minimal,
    Low,
    Medium,
    High,
    #[serde(rename = "xhigh")]
    XHigh,
}

impl ReasoningEffort {
    /// Whether any reasoning was asked for.
    pub fn is_requested(&self) -> bool {
        *self != ReasoningEffort::Off
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Off => "off",
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
            ReasoningEffort::XHigh => "xhigh",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(ReasoningEffort::Off),
            "minimal" => Ok(ReasoningEffort::Minimal),
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            "xhigh" => Ok(ReasoningEffort::XHigh),
            other => Err(format!(
                "Invalid reasoning effort '{}'. Valid values: off, minimal, low, medium, high, xhigh",
                other
            )),
        }
    }
}
