//! # Scraping Library
//!
//! Polite multi-source article acquisition for the event search pipeline.
//!
//! ## Architecture
//!
//! ```text
//! DISCOVER → GATE → FETCH → EXTRACT
//!
//! 1. Discovery turns a query into candidate article URLs
//!    (custom-search API or a scraped HTML search page)
//! 2. RobotsGate checks robots.txt (cached per host, permissive on failure)
//! 3. RateLimiter serialises requests per domain at a minimum interval
//! 4. Fetcher issues one attempt with UA rotation and encoding recovery
//! 5. html extracts title/content/date/author via per-source selectors
//! ```
//!
//! The rate limiter is the single serialisation point for outbound HTTP:
//! every fetch passes through it, so parallel pipeline workers can share
//! one `Fetcher` without overwhelming any host.
//!
//! ## Modules
//!
//! - [`rate_limit`] - Per-domain minimum-interval pacing
//! - [`robots`] - robots.txt parsing and the cached fetch gate
//! - [`fetch`] - Single-attempt HTTP fetcher with encoding recovery
//! - [`encoding`] - Charset detection ladder for mislabelled bodies
//! - [`html`] - Selector-driven and generic content extraction
//! - [`sources`] - Named source configurations loaded from YAML
//! - [`discovery`] - Query -> candidate URL list

pub mod discovery;
pub mod encoding;
pub mod error;
pub mod fetch;
pub mod html;
pub mod rate_limit;
pub mod robots;
pub mod sources;

pub use discovery::{
    ApiSearchClient, Discovery, DiscoveryDefaults, EffectiveLimits, LimitOverrides, resolve_limits,
};
pub use error::{FetchError, FetchResult, RegistryError, RegistryResult};
pub use fetch::{FetchOptions, Fetcher, HttpMethod};
pub use rate_limit::RateLimiter;
pub use robots::{RobotsGate, RobotsTxt, RobotsVerdict};
pub use sources::{SourceConfig, SourceRegistry};
