//! # tessera-core
//!
//! Core types and abstractions for Tessera, the provider adapter layer of a
//! coding-assistant agent.
//!
//! This crate provides:
//! - Message and conversation primitives (including reasoning traces)
//! - Tool definitions and tool calls
//! - Model descriptors, wire-protocol families and reasoning levels
//! - Configuration system
//! - Common error types

pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod tool;

pub use config::Config;
pub use error::{Error, ProviderError, Result};
pub use message::{Content, ContentPart, Message, Role};
pub use model::{InputModality, ModelCost, ModelDescriptor, ReasoningEffort, WireApi};
pub use tool::{ToolCall, ToolDefinition};
