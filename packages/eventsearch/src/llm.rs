//! Trait seam over LLM access.
//!
//! The extractor depends on this trait rather than the concrete router
//! so tests can substitute canned replies.

use async_trait::async_trait;
use llm_client::{GenerationMeta, GenerationRequest, LlmResult, LlmRouter, Provider};

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate text, optionally pinning a provider.
    async fn generate(
        &self,
        request: &GenerationRequest,
        provider: Option<Provider>,
    ) -> LlmResult<(String, GenerationMeta)>;
}

#[async_trait]
impl LanguageModel for LlmRouter {
    async fn generate(
        &self,
        request: &GenerationRequest,
        provider: Option<Provider>,
    ) -> LlmResult<(String, GenerationMeta)> {
        LlmRouter::generate(self, request, provider).await
    }
}
