//! Typed errors for LLM operations.

use thiserror::Error;

/// Errors that can occur calling an LLM provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider is not configured (missing credentials or endpoint)
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Authentication or account problem; never retried
    #[error("authentication error: {0}")]
    Auth(String),

    /// Rate limited and retries were exhausted
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error payload
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Provider returned a response with no content
    #[error("empty response from provider")]
    EmptyResponse,

    /// Every configured provider failed for this request
    #[error("all providers failed")]
    AllProvidersFailed,
}

/// Result type alias for LLM operations.
pub type LlmResult<T> = std::result::Result<T, LlmError>;
