//! Settings collaborator.

use parking_lot::RwLock;

use tessera_core::config::SettingsConfig;
use tessera_core::{Config, ReasoningEffort};

/// Source of user-level defaults for new sessions.
pub trait SettingsProvider: Send + Sync {
    /// Keep reasoning traces across turns.
    fn preserve_thinking(&self) -> bool;

    /// Default reasoning effort.
    fn reasoning(&self) -> ReasoningEffort;

    /// Fail instead of dropping reasoning on models without it.
    fn strict_reasoning(&self) -> bool {
        false
    }

    /// Output token limit, if the user set one.
    fn max_tokens(&self) -> Option<u32> {
        None
    }
}

/// Settings held in memory, optionally seeded from configuration.
#[derive(Debug, Default)]
pub struct SettingsManager {
    settings: RwLock<SettingsConfig>,
}

impl SettingsManager {
    pub fn in_memory(settings: SettingsConfig) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Seed from the `[settings]` section of a loaded config.
    pub fn from_config(config: &Config) -> Self {
        Self::in_memory(config.settings.clone())
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> SettingsConfig {
        self.settings.read().clone()
    }

    pub fn set_preserve_thinking(&self, preserve: bool) {
        self.settings.write().preserve_thinking = preserve;
    }

    pub fn set_reasoning(&self, reasoning: ReasoningEffort) {
        self.settings.write().reasoning = reasoning;
    }

    pub fn set_strict_reasoning(&self, strict: bool) {
        self.settings.write().strict_reasoning = strict;
    }

    pub fn set_max_tokens(&self, max_tokens: Option<u32>) {
        self.settings.write().max_tokens = max_tokens;
    }
}

impl SettingsProvider for SettingsManager {
    fn preserve_thinking(&self) -> bool {
        self.settings.read().preserve_thinking
    }

    fn reasoning(&self) -> ReasoningEffort {
        self.settings.read().reasoning
    }

    fn strict_reasoning(&self) -> bool {
        self.settings.read().strict_reasoning
    }

    fn max_tokens(&self) -> Option<u32> {
        self.settings.read().max_tokens
    }
}
