//! Transports: how a shaped request becomes a sequence of raw JSON chunks.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, instrument};

use tessera_core::{ProviderError, WireApi};

use crate::payload::ProviderRequest;
use crate::sse::SseParser;

/// Messages API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Raw provider chunks, one JSON value per server event.
pub type RawChunkStream = Pin<Box<dyn Stream<Item = Result<Value, ProviderError>> + Send>>;

/// Something that can execute a [`ProviderRequest`].
///
/// Dropping the returned stream must release the underlying connection.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &ProviderRequest) -> Result<RawChunkStream, ProviderError>;
}

/// HTTPS transport speaking Server-Sent Events.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, timeouts).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(provider = %request.provider, model = %request.model))]
    async fn open(&self, request: &ProviderRequest) -> Result<RawChunkStream, ProviderError> {
        let req = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream");

        let req = match request.api {
            WireApi::OpenAiCompletions => req.bearer_auth(&request.api_key),
            WireApi::AnthropicMessages => req
                .header("x-api-key", &request.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        debug!(url = %request.url, "Sending streaming request");

        let response = req
            .json(&request.body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(&request.provider, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("{} API error: {} - {}", request.provider, status, error_text);
            return Err(ProviderError::api_error(&request.provider, status.as_u16(), error_text));
        }

        Ok(sse_json_stream(request.provider.clone(), response.bytes_stream()))
    }
}

/// Parse a byte stream of SSE events into JSON values.
///
/// A `[DONE]` event ends the stream. Every event from a network read is
/// yielded before the next read.
pub fn sse_json_stream<S, B, E>(provider: String, bytes: S) -> RawChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        parser: SseParser::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let parsed = stream::unfold(state, move |mut state| {
        let provider = provider.clone();
        async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    if event.is_done() {
                        return None;
                    }
                    let item = serde_json::from_str::<Value>(&event.data).map_err(|e| {
                        ProviderError::malformed(&provider, format!("invalid JSON in event: {}", e))
                    });
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }

                match state.bytes.next().await {
                    Some(Ok(bytes)) => {
                        let events = state.parser.feed(bytes.as_ref());
                        state.pending.extend(events);
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        return Some((Err(ProviderError::transport(&provider, e.to_string())), state));
                    }
                    None => {
                        state.finished = true;
                        let tail = state.parser.finish();
                        state.pending.extend(tail);
                    }
                }
            }
        }
    });

    Box::pin(parsed)
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    parser: SseParser,
    pending: VecDeque<crate::sse::SseEvent>,
    finished: bool,
}
