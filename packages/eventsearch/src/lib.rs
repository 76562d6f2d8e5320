//! # Event Search
//!
//! Core of the event search engine: turns a natural-language event query
//! into a ranked stream of structured event records extracted from news
//! and social-media content.
//!
//! ## Architecture
//!
//! ```text
//! QUERY → DISCOVER → FETCH → EXTRACT → SCORE → STREAM
//!
//! 1. Discovery turns the query into candidate article URLs (scraping crate)
//! 2. Articles are fetched politely and text-extracted
//! 3. The EventExtractor prompts an LLM and validates its JSON reply
//! 4. The QueryMatcher scores events against the query
//! 5. Accepted events append to the session and stream to the client
//! ```
//!
//! The social-media path substitutes the [`aggregator`] for discovery
//! and fetching: platform adapters return a common content record that
//! feeds the same extractor.
//!
//! ## Construction
//!
//! There are no global singletons; the orchestrator receives its
//! collaborators explicitly:
//!
//! ```rust,ignore
//! let registry = Arc::new(SourceRegistry::load(&config.sources_config_path)?);
//! let fetcher = Arc::new(Fetcher::new(rate_limiter, robots));
//! let scraper = Arc::new(WebScraper::new(fetcher, discovery, config.respect_robots));
//! let extractor = Arc::new(EventExtractor::new(Arc::new(router)));
//! let service = SearchService::new(registry, scraper, extractor,
//!     QueryMatcher::new(config.match_weights), sessions, settings);
//! ```
//!
//! ## Modules
//!
//! - [`types`] - The data model (events, articles, queries, frames)
//! - [`extractor`] - LLM event extraction with validation
//! - [`matcher`] - Weighted relevance scoring
//! - [`session`] - Session store with cancellation
//! - [`aggregator`] - Social content caching and platform routing
//! - [`orchestrator`] - The end-to-end pipeline
//! - [`ner`] - Heuristic entity detection
//! - [`config`] - Environment-driven configuration
//! - [`testing`] - Mock implementations for tests

pub mod aggregator;
pub mod config;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod matcher;
pub mod ner;
pub mod orchestrator;
pub mod scrape;
pub mod session;
pub mod social_search;
pub mod testing;
pub mod types;

pub use aggregator::{CacheStatus, ContentAggregator, PlatformAdapter};
pub use config::{Config, ScraperBackend};
pub use error::{Result, SearchError};
pub use extractor::{EventExtractor, Extraction, ExtractionInput, ExtractionMeta, SkipReason};
pub use llm::LanguageModel;
pub use matcher::{MatchWeights, QueryMatcher, ScoredEvent};
pub use orchestrator::{PipelineSettings, SearchService};
pub use scrape::{ArticleScraper, WebScraper};
pub use session::{Progress, Session, SessionStatus, SessionStore};
pub use social_search::SocialAnalyzer;
pub use types::{
    Article, Casualties, EntityBundle, EventRecord, EventType, Location, PerpetratorType,
    Platform, SearchOutcome, SearchQuery, SearchResponse, SocialContent, StreamFrame,
};
