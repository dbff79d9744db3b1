//! Trait abstractions for runtime I/O
//!
//! The executor reaches the LLM, the transcript store and the mailer only
//! through these seams so it can be driven by mocks in tests.

use crate::llm::{FragmentStream, LlmError, LlmRequest, LlmResponse, ModelRegistry};
use async_trait::async_trait;
use std::sync::Arc;

pub use crate::mail::MailDispatcher;
pub use crate::store::TranscriptStore;

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete an LLM request in one shot
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Open a streamed completion
    async fn stream(&self, request: &LlmRequest) -> Result<FragmentStream, LlmError>;

    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    async fn stream(&self, request: &LlmRequest) -> Result<FragmentStream, LlmError> {
        (**self).stream(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use `ModelRegistry` as `LlmClient`
pub struct RegistryLlmClient {
    registry: Arc<ModelRegistry>,
    model_id: String,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ModelRegistry>, model_id: String) -> Self {
        Self { registry, model_id }
    }

    fn service(&self) -> Result<Arc<dyn crate::llm::LlmService>, LlmError> {
        self.registry
            .get(&self.model_id)
            .ok_or_else(|| LlmError::auth(format!("Model {} is not available", self.model_id)))
    }
}

#[async_trait]
impl LlmClient for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service()?.complete(request).await
    }

    async fn stream(&self, request: &LlmRequest) -> Result<FragmentStream, LlmError> {
        self.service()?.stream(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
