//! Session errors.

use tessera_core::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session builder is missing a {0}")]
    Incomplete(&'static str),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl SessionError {
    /// Get a user-friendly recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SessionError::Incomplete(_) => {
                Some("Set a client and a model on the SessionBuilder before calling build()")
            }
            SessionError::Provider(e) => e.recovery_suggestion(),
        }
    }
}
