//! Payload builder: turns a provider-agnostic request into the body a
//! provider's wire-protocol family expects.
//!
//! Each family lives in its own module and is selected with a `match` on
//! [`WireApi`]; adding a family means adding one arm here and one module.

use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use tessera_core::{ModelDescriptor, ProviderError, ReasoningEffort, WireApi};

use crate::options::{ReasoningPolicy, StreamOptions};
use crate::types::CompletionRequest;
use crate::{anthropic, openai};

/// A fully shaped request, ready for a transport.
#[derive(Clone)]
pub struct ProviderRequest {
    pub provider: String,
    pub model: String,
    pub api: WireApi,
    /// Endpoint URL including the family-specific path
    pub url: String,
    pub api_key: String,
    /// The exact JSON body that is sent
    pub body: Value,
}

impl fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRequest")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api", &self.api)
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("body", &self.body)
            .finish()
    }
}

/// Reasoning settings after applying the model's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reasoning {
    /// The model has a reasoning channel at all
    pub capable: bool,
    pub effort: ReasoningEffort,
    pub preserve: bool,
}

impl Reasoning {
    fn none() -> Self {
        Self {
            capable: false,
            effort: ReasoningEffort::Off,
            preserve: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.capable && self.effort.is_requested()
    }
}

/// Build the provider request for a model.
///
/// The observer in `options`, if any, is called exactly once with the final
/// body before this function returns.
pub fn build(
    model: &ModelDescriptor,
    request: &CompletionRequest,
    options: &StreamOptions,
) -> Result<ProviderRequest, ProviderError> {
    let reasoning = resolve_reasoning(model, options)?;

    let api_key = options
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ProviderError::not_configured(&model.provider))?;

    let body = match model.api {
        WireApi::OpenAiCompletions => openai::build_body(model, request, options, reasoning),
        WireApi::AnthropicMessages => anthropic::build_body(model, request, options, reasoning),
    };
    let mut body = body.map_err(|e| {
        ProviderError::transport(&model.provider, format!("failed to encode request: {}", e))
    })?;
    merge_extra(&mut body, &options.extra);

    if let Some(observer) = &options.on_payload {
        observer(&body);
    }

    Ok(ProviderRequest {
        provider: model.provider.clone(),
        model: model.id.clone(),
        api: model.api,
        url: endpoint(model),
        api_key,
        body,
    })
}

fn resolve_reasoning(
    model: &ModelDescriptor,
    options: &StreamOptions,
) -> Result<Reasoning, ProviderError> {
    if model.reasoning {
        return Ok(Reasoning {
            capable: true,
            effort: options.reasoning,
            preserve: options.preserve_thinking,
        });
    }

    if options.reasoning.is_requested() {
        if options.policy == ReasoningPolicy::Strict {
            return Err(ProviderError::UnsupportedCapability {
                provider: model.provider.clone(),
                model: model.id.clone(),
                capability: "reasoning".to_string(),
            });
        }
        debug!(
            model = %model.qualified_id(),
            effort = %options.reasoning,
            "Model has no reasoning channel, dropping reasoning options"
        );
    }

    Ok(Reasoning::none())
}

/// Output token limit: the caller's value, or the model's limit capped at
/// 32 000, never above what the model allows.
pub(crate) fn max_tokens(model: &ModelDescriptor, options: &StreamOptions) -> u32 {
    options
        .max_tokens
        .unwrap_or_else(|| model.max_tokens.min(32_000))
        .min(model.max_tokens)
}

fn endpoint(model: &ModelDescriptor) -> String {
    let base = model.base_url.trim_end_matches('/');
    match model.api {
        WireApi::OpenAiCompletions => format!("{}/chat/completions", base),
        WireApi::AnthropicMessages => format!("{}/messages", base),
    }
}

/// Passthrough fields never replace what the builder produced.
fn merge_extra(body: &mut Value, extra: &Map<String, Value>) {
    let Some(object) = body.as_object_mut() else {
        return;
    };
    for (key, value) in extra {
        if object.contains_key(key) {
            warn!(field = %key, "Ignoring passthrough field that would overwrite the payload");
            continue;
        }
        object.insert(key.clone(), value.clone());
    }
}
