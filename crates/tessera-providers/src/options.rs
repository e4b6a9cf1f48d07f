//! Per-call options.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tessera_core::ReasoningEffort;

/// Callback invoked once with the exact outbound payload, before any I/O.
pub type PayloadObserver = Arc<dyn Fn(&Value) + Send + Sync>;

/// What to do when reasoning is requested from a model that has none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReasoningPolicy {
    /// Drop the reasoning options and carry on
    #[default]
    Permissive,
    /// Fail the call with `UnsupportedCapability`
    Strict,
}

/// Options for one streamed completion.
///
/// Callers may pass the same options to models with and without reasoning
/// support; reasoning fields are ignored where they do not apply unless the
/// policy is [`ReasoningPolicy::Strict`].
#[derive(Clone, Default)]
pub struct StreamOptions {
    /// Credential for the provider
    pub api_key: Option<String>,
    /// Requested reasoning effort
    pub reasoning: ReasoningEffort,
    /// Keep reasoning traces across turns
    pub preserve_thinking: bool,
    /// Maximum tokens to generate (capped at the model's limit)
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Reasoning strictness
    pub policy: ReasoningPolicy,
    /// Provider-specific fields merged into the payload
    pub extra: Map<String, Value>,
    /// Payload observation hook
    pub on_payload: Option<PayloadObserver>,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the reasoning effort.
    pub fn with_reasoning(mut self, reasoning: ReasoningEffort) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Keep or discard reasoning traces between turns.
    pub fn with_preserve_thinking(mut self, preserve: bool) -> Self {
        self.preserve_thinking = preserve;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Fail instead of dropping reasoning on non-reasoning models.
    pub fn strict(mut self) -> Self {
        self.policy = ReasoningPolicy::Strict;
        self
    }

    /// Add a provider-specific payload field.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Observe the outbound payload.
    pub fn on_payload(mut self, observer: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_payload = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("reasoning", &self.reasoning)
            .field("preserve_thinking", &self.preserve_thinking)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("policy", &self.policy)
            .field("extra", &self.extra)
            .field("on_payload", &self.on_payload.is_some())
            .finish()
    }
}
