//! Drives one stream from transport to settled result.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use tessera_core::{ModelDescriptor, ProviderError};

use super::accumulator::StreamAccumulator;
use super::chunk::decoder_for;
use super::event::StreamEvent;
use crate::payload::ProviderRequest;
use crate::transport::Transport;
use crate::types::Completion;

/// Open the transport, decode and accumulate chunks until the stream
/// settles.
///
/// Events are forwarded as they are produced; the terminal event is left to
/// the caller. Returning drops the raw stream, which releases the transport.
#[instrument(skip_all, fields(provider = %request.provider, model = %request.model))]
pub(crate) async fn run(
    model: ModelDescriptor,
    request: ProviderRequest,
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
) -> Result<Completion, ProviderError> {
    let mut accumulator = StreamAccumulator::new(&model);
    let mut decoder = decoder_for(&model);
    let cancelled = || ProviderError::Cancelled {
        provider: model.provider.clone(),
    };

    // The receiver may already be gone; the result still settles.
    let _ = events.send(accumulator.start());

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(accumulator.fail(cancelled())),
        opened = transport.open(&request) => opened,
    };
    let mut chunks = match opened {
        Ok(chunks) => chunks,
        Err(e) => return Err(accumulator.fail(e)),
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stream cancelled");
                return Err(accumulator.fail(cancelled()));
            }
            next = chunks.next() => next,
        };

        let raw = match next {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => return accumulator.interrupt(e),
            None => return accumulator.end_of_stream(),
        };

        let chunk = match decoder.decode(&raw) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => continue,
            Err(e) => {
                warn!(kind = e.kind(), "Failed to decode stream chunk: {}", e);
                return accumulator.interrupt(e);
            }
        };

        for event in accumulator.apply(chunk) {
            let _ = events.send(event);
        }

        if accumulator.ready_to_complete() {
            let completion = accumulator.complete();
            if let Ok(ref c) = completion {
                debug!(
                    prompt_tokens = c.usage.prompt_tokens,
                    completion_tokens = c.usage.completion_tokens,
                    "Stream completed"
                );
            }
            return completion;
        }
    }
}
