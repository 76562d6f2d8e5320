//! Typed errors for the scraping library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can
//! branch on behaviour: a robots denial is skipped silently, an
//! unreadable body skips the article, a network error skips the URL.

use thiserror::Error;

/// Errors that can occur while fetching a URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// robots.txt disallows fetching this URL
    #[error("robots.txt disallows: {url}")]
    RobotsDisallowed { url: String },

    /// URL could not be parsed or has no host
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Transport-level failure (connect, TLS, read)
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success status code
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Request exceeded the configured deadline
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Body is binary, or no decoding produced readable text
    #[error("unreadable response body from {url}")]
    Unreadable { url: String },
}

/// Errors that can occur loading the source registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Sources file missing on disk
    #[error("sources file not found: {path}")]
    NotFound { path: String },

    /// File exists but is not valid YAML
    #[error("invalid sources file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// I/O failure reading the file
    #[error("error reading sources file: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
