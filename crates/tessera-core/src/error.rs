//! Error types for Tessera.
//!
//! Provider failures are modelled by [`ProviderError`], which is `Clone` so a
//! settled stream can hand the same failure to every caller that asks for it.
//! [`Error`] wraps it together with configuration and I/O failures.

use thiserror::Error;

/// Result type alias using the Tessera [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Tessera.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider error with structured details
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Config(_) => Some("Check your config file at ~/.config/tessera/config.toml"),
            Error::Provider(e) => e.recovery_suggestion(),
            _ => None,
        }
    }

    /// Create a provider-not-configured error.
    pub fn provider_not_configured(provider: &str) -> Self {
        Error::Provider(ProviderError::not_configured(provider))
    }
}

/// Provider-specific errors with detailed context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No credential available for the provider
    #[error("Provider '{provider}' is not configured")]
    NotConfigured {
        provider: String,
        env_var: Option<String>,
    },

    /// Registry lookup failed
    #[error("Model '{model}' not found for provider '{provider}'")]
    ModelNotFound { provider: String, model: String },

    /// A capability was demanded from a model that lacks it
    #[error("Model '{provider}/{model}' does not support {capability}")]
    UnsupportedCapability {
        provider: String,
        model: String,
        capability: String,
    },

    /// API request rejected with a non-success status
    #[error("API request to {provider} failed: {status} - {message}")]
    ApiError {
        provider: String,
        status: u16,
        message: String,
    },

    /// Connection or stream failure
    #[error("Transport error from {provider}: {message}")]
    Transport { provider: String, message: String },

    /// A chunk did not match the wire schema of its protocol family
    #[error("Malformed chunk from {provider}: {message}")]
    MalformedChunk { provider: String, message: String },

    /// The stream was abandoned before it settled
    #[error("Request to {provider} was cancelled")]
    Cancelled { provider: String },
}

impl ProviderError {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ProviderError::NotConfigured {
                env_var: Some(_), ..
            } => Some("Set the API key environment variable"),
            ProviderError::NotConfigured { .. } => {
                Some("Configure the provider in ~/.config/tessera/config.toml")
            }
            ProviderError::ModelNotFound { .. } => {
                Some("Use 'tessera models' to see available models")
            }
            ProviderError::UnsupportedCapability { .. } => {
                Some("Pick a reasoning-capable model or disable strict reasoning")
            }
            ProviderError::ApiError { status: 401, .. } | ProviderError::ApiError { status: 403, .. } => {
                Some("Check that your API key is valid and not expired")
            }
            ProviderError::ApiError { status: 429, .. } => {
                Some("You've hit rate limits. Wait a moment and try again")
            }
            ProviderError::ApiError {
                status: 500..=599, ..
            } => Some("The API service is having issues. Try again later"),
            ProviderError::Transport { .. } => Some("Check your internet connection"),
            _ => None,
        }
    }

    /// Whether this error propagates as a transport failure.
    ///
    /// Malformed chunks and HTTP failures are transport failures for callers;
    /// they only differ in diagnostics.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport { .. }
                | ProviderError::MalformedChunk { .. }
                | ProviderError::ApiError { .. }
        )
    }

    /// Short machine-readable kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured { .. } => "not_configured",
            ProviderError::ModelNotFound { .. } => "model_not_found",
            ProviderError::UnsupportedCapability { .. } => "unsupported_capability",
            ProviderError::ApiError { .. } => "api_error",
            ProviderError::Transport { .. } => "transport",
            ProviderError::MalformedChunk { .. } => "malformed_chunk",
            ProviderError::Cancelled { .. } => "cancelled",
        }
    }

    /// Create a not-configured error with the conventional env var, if known.
    pub fn not_configured(provider: &str) -> Self {
        ProviderError::NotConfigured {
            provider: provider.to_string(),
            env_var: crate::config::default_api_key_env(provider).map(str::to_string),
        }
    }

    /// Create an API error from status code and message.
    pub fn api_error(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ProviderError::ApiError {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a malformed-chunk error.
    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::MalformedChunk {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Format an error with its recovery suggestion.
pub fn format_error_with_suggestion(error: &Error) -> String {
    let mut output = error.to_string();
    if let Some(suggestion) = error.recovery_suggestion() {
        output.push_str(&format!("\n  Suggestion: {}", suggestion));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_not_configured() {
        let err = Error::provider_not_configured("zai");
        assert!(err.to_string().contains("zai"));
        assert_eq!(err.recovery_suggestion(), Some("Set the API key environment variable"));
    }

    #[test]
    fn test_unknown_provider_has_no_env_var() {
        let err = ProviderError::not_configured("acme");
        assert_eq!(
            err,
            ProviderError::NotConfigured {
                provider: "acme".to_string(),
                env_var: None,
            }
        );
    }

    #[test]
    fn test_api_error() {
        let err = ProviderError::api_error("openai", 429, "Rate limited");
        assert!(err.to_string().contains("429"));
        assert!(err.recovery_suggestion().is_some());
        assert!(err.is_transport());
    }

    #[test]
    fn test_malformed_chunk_propagates_as_transport() {
        let err = ProviderError::malformed("zai", "missing choices");
        assert!(err.is_transport());
        assert_eq!(err.kind(), "malformed_chunk");
        assert_ne!(err, ProviderError::transport("zai", "missing choices"));
    }

    #[test]
    fn test_build_time_errors_are_not_transport() {
        let err = ProviderError::UnsupportedCapability {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            capability: "reasoning".into(),
        };
        assert!(!err.is_transport());
        assert!(err.to_string().contains("openai/gpt-4o"));
    }

    #[test]
    fn test_format_with_suggestion() {
        let err = Error::Provider(ProviderError::ModelNotFound {
            provider: "zai".into(),
            model: "glm-9".into(),
        });
        let text = format_error_with_suggestion(&err);
        assert!(text.contains("glm-9"));
        assert!(text.contains("Suggestion: Use 'tessera models'"));
    }
}
