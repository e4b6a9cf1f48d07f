//! # tessera-session
//!
//! Session composition for Tessera.
//!
//! This crate provides:
//! - A settings collaborator ([`SettingsProvider`]) with an in-memory,
//!   config-backed implementation
//! - [`SessionBuilder`], which resolves per-session options such as
//!   preserve-thinking from explicit overrides and settings
//! - [`AgentSession`], which assembles the conversation sent on each turn
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera_session::{SessionBuilder, SettingsManager};
//!
//! let settings = Arc::new(SettingsManager::from_config(&config));
//! let mut session = SessionBuilder::new()
//!     .client(client)
//!     .settings(settings)
//!     .model(model)
//!     .api_key(key)
//!     .build()?;
//!
//! let completion = session.send("hello").await?;
//! ```

pub mod error;
pub mod session;
pub mod settings;

pub use error::SessionError;
pub use session::{AgentSession, SessionBuilder};
pub use settings::{SettingsManager, SettingsProvider};
