//! Streaming: normalized chunks, accumulation and the caller-facing handle.

mod accumulator;
mod adapter;
mod chunk;
mod event;
mod handle;

pub use accumulator::{StreamAccumulator, StreamState};
pub use chunk::{decoder_for, ChunkDecoder, Delta, ProviderChunk, ToolCallFragment};
pub use event::StreamEvent;
pub use handle::StreamHandle;
