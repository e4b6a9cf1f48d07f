//! Configuration system for Tessera.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::ReasoningEffort;

/// Main configuration struct for Tessera.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider to use when none is given
    pub default_provider: Option<String>,
    /// Model to use when none is given
    pub default_model: Option<String>,
    /// Reasoning and request settings
    pub settings: SettingsConfig,
    /// Per-provider configuration, keyed by provider tag
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// Request defaults shared by every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Keep reasoning traces across turns
    pub preserve_thinking: bool,
    /// Default reasoning effort
    pub reasoning: ReasoningEffort,
    /// Fail instead of silently dropping reasoning on non-reasoning models
    pub strict_reasoning: bool,
    /// Maximum tokens per response (capped by the model)
    pub max_tokens: Option<u32>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            preserve_thinking: false,
            reasoning: ReasoningEffort::Medium,
            strict_reasoning: false,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key (can be set directly or via environment)
    pub api_key: Option<String>,
    /// Environment variable name for API key
    pub api_key_env: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key from either direct value or environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        if let Some(ref env_var) = self.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                return Some(key);
            }
        }
        None
    }
}

/// Conventional API key environment variable for a provider tag.
pub fn default_api_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "zai" => Some("ZAI_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        "dashscope" => Some("DASHSCOPE_API_KEY"),
        _ => None,
    }
}

/// Validation result with multiple issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty validation result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Get only error-level issues.
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Error).collect()
    }

    /// Get only warning-level issues.
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Warning).collect()
    }

    /// Add an error.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue
    pub severity: IssueSeverity,
    /// Field path (e.g., "settings.max_tokens")
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(&Self::config_dir(), Path::new(".tessera")).extract()
    }

    /// Layered sources: defaults, user file, project files, then environment.
    pub fn figment(user_dir: &Path, project_dir: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(user_dir.join("config.toml")))
            .merge(Toml::file(project_dir.join("config.toml")))
            // Project local config (gitignored)
            .merge(Toml::file(project_dir.join("config.local.toml")))
            .merge(Env::prefixed("TESSERA_").split("__"))
    }

    /// Load and validate configuration.
    pub fn load_validated() -> Result<Self, Error> {
        let config = Self::load().map_err(|e| Error::Config(e.to_string()))?;
        config.into_validated()
    }

    /// Validate an already-loaded configuration, logging warnings.
    pub fn into_validated(self) -> Result<Self, Error> {
        let result = self.validate();

        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(Error::Config(format!(
                "Configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("Config warning - {}: {}", warning.field, warning.message);
        }

        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(max_tokens) = self.settings.max_tokens {
            if max_tokens == 0 {
                result.add_error("settings.max_tokens", "max_tokens must be greater than 0");
            }
        }

        if self.settings.strict_reasoning && !self.settings.reasoning.is_requested() {
            result.add_warning(
                "settings.strict_reasoning",
                "strict_reasoning has no effect while reasoning is off",
            );
        }

        if self.default_model.is_some() && self.default_provider.is_none() {
            result.add_warning(
                "default_model",
                "default_model is ignored without default_provider",
            );
        }

        for (name, provider) in &self.providers {
            if provider.api_key.as_ref().map(|k| k.is_empty()).unwrap_or(false) {
                result.add_warning(format!("providers.{}.api_key", name), "API key is empty string");
            }
            if let Some(ref base_url) = provider.base_url {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    result.add_error(
                        format!("providers.{}.base_url", name),
                        "base_url must start with http:// or https://",
                    );
                }
            }
        }

        result
    }

    /// Resolve the credential for a provider: configured key, configured env
    /// var, then the provider's conventional env var.
    pub fn api_key(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|c| c.resolve_api_key())
            .or_else(|| default_api_key_env(provider).and_then(|var| std::env::var(var).ok()))
    }

    /// Base URL override for a provider, if configured.
    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.providers.get(provider).and_then(|c| c.base_url.as_deref())
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("tessera"))
            .unwrap_or_else(|| PathBuf::from("~/.config/tessera"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_ok(), "Default config should be valid: {:?}", result.issues);
        assert!(!config.settings.preserve_thinking);
    }

    #[test]
    fn test_zero_max_tokens_is_error() {
        let mut config = Config::default();
        config.settings.max_tokens = Some(0);
        let result = config.validate();
        assert!(!result.is_ok());
        assert!(result.errors().iter().any(|e| e.field == "settings.max_tokens"));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.providers.insert(
            "zai".to_string(),
            ProviderConfig {
                base_url: Some("api.z.ai".to_string()),
                ..Default::default()
            },
        );
        let result = config.validate();
        assert!(result.errors().iter().any(|e| e.field == "providers.zai.base_url"));
    }

    #[test]
    fn test_strict_without_reasoning_is_warning() {
        let mut config = Config::default();
        config.settings.strict_reasoning = true;
        config.settings.reasoning = ReasoningEffort::Off;
        let result = config.validate();
        assert!(result.is_ok());
        assert!(result.warnings().iter().any(|w| w.field == "settings.strict_reasoning"));
    }

    #[test]
    fn test_direct_api_key_wins() {
        let mut config = Config::default();
        config.providers.insert(
            "zai".to_string(),
            ProviderConfig {
                api_key: Some("from-config".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(config.api_key("zai").as_deref(), Some("from-config"));
    }

    #[test]
    fn test_layered_files() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(
            user.path().join("config.toml"),
            "default_provider = \"zai\"\n[settings]\npreserve_thinking = true\nreasoning = \"high\"\n",
        )
        .unwrap();
        std::fs::write(
            project.path().join("config.toml"),
            "[settings]\nreasoning = \"low\"\n[providers.zai]\nbase_url = \"https://open.bigmodel.cn/api/paas/v4\"\n",
        )
        .unwrap();

        let config: Config = Config::figment(user.path(), project.path()).extract().unwrap();
        assert_eq!(config.default_provider.as_deref(), Some("zai"));
        assert!(config.settings.preserve_thinking);
        assert_eq!(config.settings.reasoning, ReasoningEffort::Low);
        assert_eq!(config.base_url("zai"), Some("https://open.bigmodel.cn/api/paas/v4"));
    }
}
