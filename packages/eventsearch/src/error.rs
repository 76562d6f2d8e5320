//! Typed errors for the event search core.

use thiserror::Error;

/// Errors surfaced by the search core.
#[derive(Debug, Error)]
pub enum SearchError {
    /// No session with this id exists
    #[error("session not found: {id}")]
    SessionNotFound { id: String },

    /// Startup configuration violates an invariant
    #[error("configuration error: {0}")]
    Config(String),

    /// Source registry could not be loaded
    #[error("source registry error: {0}")]
    Registry(#[from] scraping::RegistryError),

    /// LLM access failed in a way the pipeline cannot absorb
    #[error("LLM error: {0}")]
    Llm(#[from] llm_client::LlmError),
}

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
