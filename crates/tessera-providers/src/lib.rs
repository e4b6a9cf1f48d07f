//! # tessera-providers
//!
//! Provider adapter layer for Tessera.
//!
//! This crate provides:
//! - The model registry and built-in catalog
//! - Payload builders for the OpenAI Chat Completions and Anthropic Messages
//!   families, including the Z.ai, Qwen and DeepSeek dialects
//! - Stream decoding and accumulation into a normalized [`Completion`]
//! - An HTTPS transport and a scripted in-process transport

pub mod anthropic;
pub mod client;
pub mod openai;
pub mod options;
pub mod payload;
pub mod registry;
pub mod scripted;
pub mod sse;
pub mod stream;
pub mod transport;
pub mod types;

pub use client::Client;
pub use options::{PayloadObserver, ReasoningPolicy, StreamOptions};
pub use payload::ProviderRequest;
pub use registry::ModelRegistry;
pub use scripted::{ScriptFeed, ScriptedTransport};
pub use stream::{StreamEvent, StreamHandle};
pub use transport::{HttpTransport, RawChunkStream, Transport};
pub use types::{Completion, CompletionRequest, FinishReason, ThinkingBlock, Usage};
