//! In-process transport that replays scripted chunks.
//!
//! Used to exercise the payload builder and stream adapter without a
//! network, and to drive the CLI's dry-run mode.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use tessera_core::ProviderError;

use crate::payload::ProviderRequest;
use crate::transport::{RawChunkStream, Transport};

type Item = Result<Value, ProviderError>;

enum Script {
    /// Replayed in full on every open
    Replay(Vec<Item>),
    /// Fed by a [`ScriptFeed`]; can be opened once
    Live(Option<mpsc::UnboundedReceiver<Item>>),
    /// Every open fails
    Fail(ProviderError),
}

/// A [`Transport`] that records requests and plays back a script.
pub struct ScriptedTransport {
    script: Mutex<Script>,
    requests: Mutex<Vec<ProviderRequest>>,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replay these chunks, then end the stream.
    pub fn replay(chunks: Vec<Value>) -> Self {
        Self::replay_items(chunks.into_iter().map(Ok).collect())
    }

    /// Replay chunks and transport failures in order.
    pub fn replay_items(items: Vec<Item>) -> Self {
        Self::with_script(Script::Replay(items))
    }

    /// Fail every open with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::with_script(Script::Fail(error))
    }

    /// A transport whose single stream is fed on demand.
    pub fn live() -> (Self, ScriptFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_script(Script::Live(Some(rx))), ScriptFeed { tx })
    }

    /// Every request opened so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().last().cloned()
    }

    /// Number of chunks consumers have pulled across all streams.
    pub fn chunks_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, request: &ProviderRequest) -> Result<RawChunkStream, ProviderError> {
        self.requests.lock().push(request.clone());

        let pulled = self.pulled.clone();
        let count = move |_: &Item| {
            pulled.fetch_add(1, Ordering::SeqCst);
        };

        let mut script = self.script.lock();
        match &mut *script {
            Script::Replay(items) => Ok(Box::pin(stream::iter(items.clone()).inspect(count))),
            Script::Live(rx) => {
                let rx = rx.take().ok_or_else(|| {
                    ProviderError::transport(&request.provider, "live script already consumed")
                })?;
                let live = stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok(Box::pin(live.inspect(count)))
            }
            Script::Fail(error) => Err(error.clone()),
        }
    }
}

/// Feeding end of a live [`ScriptedTransport`].
///
/// Dropping the feed ends the stream.
#[derive(Debug, Clone)]
pub struct ScriptFeed {
    tx: mpsc::UnboundedSender<Item>,
}

impl ScriptFeed {
    /// Push a chunk. Returns `false` once the consumer is gone.
    pub fn push(&self, chunk: Value) -> bool {
        self.tx.send(Ok(chunk)).is_ok()
    }

    /// Inject a transport failure.
    pub fn fail(&self, error: ProviderError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// Resolves once the consuming stream has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
