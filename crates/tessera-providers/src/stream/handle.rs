//! Caller-facing handle for one streamed completion.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

use tessera_core::{ModelDescriptor, ProviderError};

use super::adapter;
use super::event::StreamEvent;
use crate::payload::ProviderRequest;
use crate::transport::Transport;
use crate::types::Completion;

type Outcome = Option<Result<Completion, ProviderError>>;

/// A single-pass stream of [`StreamEvent`]s plus the settled result.
///
/// Dropping the handle cancels the stream and releases the transport.
pub struct StreamHandle {
    provider: String,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    outcome: watch::Receiver<Outcome>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl StreamHandle {
    /// Drive `request` on a background task. Requires a tokio runtime.
    pub(crate) fn spawn(
        model: ModelDescriptor,
        request: ProviderRequest,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let provider = request.provider.clone();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let result = adapter::run(model, request, transport, event_tx.clone(), task_cancel).await;
            let terminal = match &result {
                Ok(completion) => StreamEvent::Done {
                    completion: completion.clone(),
                },
                Err(error) => StreamEvent::Error {
                    error: error.clone(),
                },
            };
            let _ = event_tx.send(terminal);
            let _ = outcome_tx.send(Some(result));
        });

        Self {
            provider,
            events: event_rx,
            outcome: outcome_rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Provider tag of the model being streamed.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Wait for the stream to settle.
    ///
    /// Does not require the events to be consumed. Every call returns the
    /// same outcome.
    pub async fn result(&self) -> Result<Completion, ProviderError> {
        let mut outcome = self.outcome.clone();
        let settled = match outcome.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| {
            Err(ProviderError::Cancelled {
                provider: self.provider.clone(),
            })
        })
    }

    /// The outcome, if the stream has already settled.
    pub fn try_result(&self) -> Option<Result<Completion, ProviderError>> {
        self.outcome.borrow().clone()
    }

    /// Abort the stream. The result settles as `Cancelled` unless it already
    /// settled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for StreamHandle {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("provider", &self.provider)
            .field("settled", &self.outcome.borrow().is_some())
            .finish()
    }
}
