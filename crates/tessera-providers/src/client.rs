//! Call surface: resolve, build, and stream.

use std::sync::Arc;

use tracing::{debug, instrument};

use tessera_core::{ModelDescriptor, ProviderError};

use crate::options::StreamOptions;
use crate::payload;
use crate::registry::ModelRegistry;
use crate::stream::StreamHandle;
use crate::transport::{HttpTransport, Transport};
use crate::types::{Completion, CompletionRequest};

/// Entry point for streamed completions.
///
/// Cheap to clone; the registry and transport are shared.
#[derive(Clone)]
pub struct Client {
    registry: Arc<ModelRegistry>,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(registry: Arc<ModelRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Client speaking HTTPS to the real provider endpoints.
    pub fn http(registry: Arc<ModelRegistry>) -> Self {
        Self::new(registry, Arc::new(HttpTransport::new()))
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn resolve(&self, provider: &str, model_id: &str) -> Option<&ModelDescriptor> {
        self.registry.resolve(provider, model_id)
    }

    /// Start streaming a completion.
    ///
    /// Payload errors (missing credentials, unsupported reasoning under the
    /// strict policy) are returned before anything is sent. Must be called
    /// from within a tokio runtime.
    #[instrument(skip(self, request, options), fields(model = %model.qualified_id()))]
    pub fn stream(
        &self,
        model: &ModelDescriptor,
        request: CompletionRequest,
        options: &StreamOptions,
    ) -> Result<StreamHandle, ProviderError> {
        let provider_request = payload::build(model, &request, options)?;
        debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            reasoning = %options.reasoning,
            "Starting stream"
        );
        Ok(StreamHandle::spawn(
            model.clone(),
            provider_request,
            self.transport.clone(),
        ))
    }

    /// [`Client::stream`] for a model looked up by provider and ID.
    pub fn stream_by_id(
        &self,
        provider: &str,
        model_id: &str,
        request: CompletionRequest,
        options: &StreamOptions,
    ) -> Result<StreamHandle, ProviderError> {
        let model = self.registry.require(provider, model_id)?;
        self.stream(model, request, options)
    }

    /// Stream a completion and wait for the result.
    pub async fn complete(
        &self,
        model: &ModelDescriptor,
        request: CompletionRequest,
        options: &StreamOptions,
    ) -> Result<Completion, ProviderError> {
        self.stream(model, request, options)?.result().await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("models", &self.registry.len())
            .finish()
    }
}
