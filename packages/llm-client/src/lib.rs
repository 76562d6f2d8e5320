//! # LLM Client
//!
//! Provider-agnostic LLM access for the event extraction pipeline.
//!
//! One call interface over two providers with automatic fallback:
//!
//! - **Claude** — remote API, prompt caching (system prompts marked
//!   cache-eligible), token/cost accounting against a price table,
//!   semaphore-bounded concurrency, 429 backoff.
//! - **Ollama** — local inference, merged single prompt, token counts
//!   only.
//!
//! ```rust,ignore
//! use llm_client::{ClaudeClient, GenerationRequest, LlmRouter, OllamaClient, Provider};
//!
//! let router = LlmRouter::new(
//!     ClaudeClient::new(std::env::var("CLAUDE_API_KEY").ok()),
//!     OllamaClient::new("http://localhost:11434", "qwen2.5:3b"),
//!     Provider::Claude,
//!     true,
//! );
//!
//! let request = GenerationRequest::new("Extract the event from ...")
//!     .with_system_prompt("You are an event extraction AI.")
//!     .with_max_tokens(500);
//!
//! let (text, meta) = router.generate(&request, None).await?;
//! println!("{} via {} (fallback: {})", text, meta.provider, meta.fallback_used);
//! ```

pub mod claude;
pub mod error;
pub mod ollama;
pub mod router;
pub mod types;

pub use claude::{ClaudeClient, DEFAULT_CLAUDE_MODEL};
pub use error::{LlmError, LlmResult};
pub use ollama::{OllamaClient, DEFAULT_OLLAMA_MODEL};
pub use router::{LlmRouter, Provider, ProviderStatus, RouterStatus};
pub use types::{
    GenerationMeta, GenerationRequest, ModelInfo, ModelPricing, UsageBreakdown, UsageStats,
    UsageSummary,
};
