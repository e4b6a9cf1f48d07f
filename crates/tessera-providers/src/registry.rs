//! Model registry: the catalog of known (provider, model) pairs.
//!
//! The registry is built once and then shared read-only, usually behind an
//! `Arc`. Lookups never mutate it.

use std::collections::BTreeMap;

use tessera_core::{Config, Error, ModelDescriptor, ProviderError, WireApi};

/// Default OpenAI API base URL.
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
/// Default Anthropic API base URL.
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
/// Z.ai coding plan endpoint.
pub const ZAI_API_URL: &str = "https://api.z.ai/api/coding/paas/v4";
/// DeepSeek API base URL.
pub const DEEPSEEK_API_URL: &str = "https://api.deepseek.com";
/// Alibaba DashScope OpenAI-compatible endpoint.
pub const DASHSCOPE_API_URL: &str = "https://dashscope-intl.aliyuncs.com/compatible-mode/v1";

/// Catalog of model descriptors keyed by provider and model ID.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, BTreeMap<String, ModelDescriptor>>,
}

impl ModelRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the built-in catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for model in builtin_models() {
            // Built-in entries are unique by construction.
            let _ = registry.register(model);
        }
        registry
    }

    /// Built-in catalog with base URL overrides from configuration applied.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::builtin();
        for (provider, provider_config) in &config.providers {
            if let Some(ref base_url) = provider_config.base_url {
                registry.override_base_url(provider, base_url);
            }
        }
        registry
    }

    /// Build a registry from descriptors, rejecting duplicates.
    pub fn from_models(models: impl IntoIterator<Item = ModelDescriptor>) -> Result<Self, Error> {
        let mut registry = Self::new();
        for model in models {
            registry.register(model)?;
        }
        Ok(registry)
    }

    /// Register a model. A (provider, id) pair can only be registered once.
    pub fn register(&mut self, model: ModelDescriptor) -> Result<(), Error> {
        let provider = self.models.entry(model.provider.clone()).or_default();
        if provider.contains_key(&model.id) {
            return Err(Error::Validation(format!(
                "model '{}' is already registered",
                model.qualified_id()
            )));
        }
        provider.insert(model.id.clone(), model);
        Ok(())
    }

    /// Point every model of a provider at a different endpoint.
    pub fn override_base_url(&mut self, provider: &str, base_url: &str) {
        if let Some(models) = self.models.get_mut(provider) {
            for model in models.values_mut() {
                model.base_url = base_url.to_string();
            }
        }
    }

    /// Look up a model. Absence is a normal outcome, not an error.
    pub fn resolve(&self, provider: &str, model_id: &str) -> Option<&ModelDescriptor> {
        self.models.get(provider).and_then(|m| m.get(model_id))
    }

    /// Look up a model, turning absence into [`ProviderError::ModelNotFound`].
    pub fn require(&self, provider: &str, model_id: &str) -> Result<&ModelDescriptor, ProviderError> {
        self.resolve(provider, model_id)
            .ok_or_else(|| ProviderError::ModelNotFound {
                provider: provider.to_string(),
                model: model_id.to_string(),
            })
    }

    /// Provider tags with at least one model.
    pub fn providers(&self) -> Vec<&str> {
        self.models.keys().map(|s| s.as_str()).collect()
    }

    /// Models of one provider, ordered by ID.
    pub fn models(&self, provider: &str) -> Vec<&ModelDescriptor> {
        self.models
            .get(provider)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }

    /// Iterate over all models, ordered by provider then ID.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values().flat_map(|m| m.values())
    }

    pub fn len(&self) -> usize {
        self.models.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn openai(id: &str, name: &str) -> ModelDescriptor {
    ModelDescriptor::new("openai", id, WireApi::OpenAiCompletions, OPENAI_API_URL).with_name(name)
}

fn anthropic(id: &str, name: &str) -> ModelDescriptor {
    ModelDescriptor::new("anthropic", id, WireApi::AnthropicMessages, ANTHROPIC_API_URL)
        .with_name(name)
        .with_images()
}

fn zai(id: &str, name: &str) -> ModelDescriptor {
    ModelDescriptor::new("zai", id, WireApi::OpenAiCompletions, ZAI_API_URL)
        .with_name(name)
        .with_reasoning(true)
}

fn deepseek(id: &str, name: &str) -> ModelDescriptor {
    ModelDescriptor::new("deepseek", id, WireApi::OpenAiCompletions, DEEPSEEK_API_URL)
        .with_name(name)
        .with_cost(0.28, 0.42, 0.028, 0.0)
}

fn dashscope(id: &str, name: &str) -> ModelDescriptor {
    ModelDescriptor::new("dashscope", id, WireApi::OpenAiCompletions, DASHSCOPE_API_URL)
        .with_name(name)
}

fn builtin_models() -> Vec<ModelDescriptor> {
    vec![
        openai("gpt-4o", "GPT-4o")
            .with_images()
            .with_limits(128_000, 16_384)
            .with_cost(2.5, 10.0, 1.25, 0.0),
        openai("gpt-4.1", "GPT-4.1")
            .with_images()
            .with_limits(1_047_576, 32_768)
            .with_cost(2.0, 8.0, 0.5, 0.0),
        openai("o4-mini", "o4-mini")
            .with_reasoning(true)
            .with_images()
            .with_limits(200_000, 100_000)
            .with_cost(1.1, 4.4, 0.275, 0.0),
        openai("gpt-5", "GPT-5")
            .with_reasoning(true)
            .with_images()
            .with_limits(400_000, 128_000)
            .with_cost(1.25, 10.0, 0.125, 0.0),
        anthropic("claude-sonnet-4-5", "Claude Sonnet 4.5")
            .with_reasoning(true)
            .with_limits(200_000, 64_000)
            .with_cost(3.0, 15.0, 0.3, 3.75),
        anthropic("claude-opus-4-1", "Claude Opus 4.1")
            .with_reasoning(true)
            .with_limits(200_000, 32_000)
            .with_cost(15.0, 75.0, 1.5, 18.75),
        anthropic("claude-3-5-haiku-latest", "Claude Haiku 3.5")
            .with_limits(200_000, 8_192)
            .with_cost(0.8, 4.0, 0.08, 1.0),
        zai("glm-5", "GLM-5")
            .with_limits(204_800, 131_072)
            .with_cost(1.0, 3.2, 0.2, 0.0),
        zai("glm-4.6", "GLM-4.6")
            .with_limits(204_800, 131_072)
            .with_cost(0.6, 2.2, 0.11, 0.0),
        zai("glm-4.5-air", "GLM-4.5-Air")
            .with_limits(131_072, 98_304)
            .with_cost(0.2, 1.1, 0.03, 0.0),
        zai("glm-4.5v", "GLM-4.5V")
            .with_images()
            .with_limits(64_000, 16_384)
            .with_cost(0.6, 1.8, 0.11, 0.0),
        deepseek("deepseek-chat", "DeepSeek V3.2").with_limits(128_000, 8_192),
        deepseek("deepseek-reasoner", "DeepSeek V3.2 (thinking)")
            .with_reasoning(true)
            .with_limits(128_000, 65_536),
        dashscope("qwen-plus", "Qwen Plus")
            .with_reasoning(true)
            .with_limits(131_072, 16_384)
            .with_cost(0.4, 1.2, 0.0, 0.0),
        dashscope("qwen3-coder-plus", "Qwen3 Coder Plus")
            .with_limits(1_000_000, 65_536)
            .with_cost(1.0, 5.0, 0.0, 0.0),
    ]
}
