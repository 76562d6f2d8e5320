//! Application configuration loaded from environment variables.
//!
//! Credentials are optional: a missing key disables its provider or
//! adapter silently. Invariants (relevance weights summing to 1.0) fail
//! fast at load time.

use std::env;
use std::str::FromStr;

use llm_client::Provider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SearchError};
use crate::matcher::MatchWeights;

/// Which backend a platform adapter routes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScraperBackend {
    /// The platform's own API
    #[default]
    Native,
    /// A generic third-party scraping service
    ScrapeCreators,
}

impl FromStr for ScraperBackend {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NATIVE" => Ok(Self::Native),
            "SCRAPECREATORS" => Ok(Self::ScrapeCreators),
            _ => Err(()),
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Search core configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // LLM
    pub default_llm_provider: Provider,
    pub enable_llm_fallback: bool,
    pub claude_api_key: Option<String>,
    pub claude_model: String,
    pub claude_max_concurrent: usize,
    pub ollama_base_url: String,
    pub ollama_model: String,

    // Pipeline limits
    pub max_search_results: usize,
    pub max_articles_to_process: usize,
    pub max_concurrent_llm: usize,
    pub max_concurrent_scrapes: usize,

    // Timeouts (seconds)
    pub http_timeout_secs: u64,
    pub article_llm_timeout_secs: u64,
    pub extraction_timeout_secs: u64,

    // TTLs (hours)
    pub session_ttl_hours: i64,
    pub content_cache_ttl_hours: i64,

    // Scraping
    pub respect_robots: bool,
    pub sources_config_path: String,

    // Search API credentials
    pub google_cse_api_key: Option<String>,
    pub google_cse_id: Option<String>,

    // Social platform credentials; adapters with no credentials disable
    // themselves silently
    pub youtube_api_key: Option<String>,
    pub twitter_bearer_token: Option<String>,
    pub facebook_access_token: Option<String>,
    pub instagram_access_token: Option<String>,
    pub scrapecreators_api_key: Option<String>,

    // Per-platform third-party scraper switches
    pub twitter_scraper: ScraperBackend,
    pub facebook_scraper: ScraperBackend,
    pub instagram_scraper: ScraperBackend,

    // Relevance weights; must sum to 1.0
    pub match_weights: MatchWeights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_llm_provider: Provider::Claude,
            enable_llm_fallback: true,
            claude_api_key: None,
            claude_model: llm_client::DEFAULT_CLAUDE_MODEL.to_string(),
            claude_max_concurrent: 5,
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: llm_client::DEFAULT_OLLAMA_MODEL.to_string(),
            max_search_results: 10,
            max_articles_to_process: 5,
            max_concurrent_llm: 4,
            max_concurrent_scrapes: 10,
            http_timeout_secs: 30,
            article_llm_timeout_secs: 60,
            extraction_timeout_secs: 300,
            session_ttl_hours: 24,
            content_cache_ttl_hours: 24,
            respect_robots: false,
            sources_config_path: "config/sources.yaml".to_string(),
            google_cse_api_key: None,
            google_cse_id: None,
            youtube_api_key: None,
            twitter_bearer_token: None,
            facebook_access_token: None,
            instagram_access_token: None,
            scrapecreators_api_key: None,
            twitter_scraper: ScraperBackend::Native,
            facebook_scraper: ScraperBackend::Native,
            instagram_scraper: ScraperBackend::Native,
            match_weights: MatchWeights::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, reading a `.env`
    /// file first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let default_llm_provider = var("DEFAULT_LLM_PROVIDER")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.default_llm_provider);

        let match_weights = MatchWeights {
            text: parse_or("WEIGHT_TEXT", defaults.match_weights.text),
            location: parse_or("WEIGHT_LOCATION", defaults.match_weights.location),
            date: parse_or("WEIGHT_DATE", defaults.match_weights.date),
            event_type: parse_or("WEIGHT_EVENT_TYPE", defaults.match_weights.event_type),
        };

        let config = Self {
            default_llm_provider,
            enable_llm_fallback: parse_or("ENABLE_LLM_FALLBACK", defaults.enable_llm_fallback),
            claude_api_key: var("CLAUDE_API_KEY"),
            claude_model: var_or("DEFAULT_CLAUDE_MODEL", &defaults.claude_model),
            claude_max_concurrent: parse_or("CLAUDE_MAX_CONCURRENT", defaults.claude_max_concurrent),
            ollama_base_url: var_or("OLLAMA_BASE_URL", &defaults.ollama_base_url),
            ollama_model: var_or("OLLAMA_MODEL", &defaults.ollama_model),
            max_search_results: parse_or("MAX_SEARCH_RESULTS", defaults.max_search_results),
            max_articles_to_process: parse_or(
                "MAX_ARTICLES_TO_PROCESS",
                defaults.max_articles_to_process,
            ),
            max_concurrent_llm: parse_or("MAX_CONCURRENT_LLM", defaults.max_concurrent_llm),
            max_concurrent_scrapes: parse_or(
                "MAX_CONCURRENT_SCRAPES",
                defaults.max_concurrent_scrapes,
            ),
            http_timeout_secs: parse_or("SCRAPER_TIMEOUT", defaults.http_timeout_secs),
            article_llm_timeout_secs: parse_or(
                "ARTICLE_LLM_TIMEOUT",
                defaults.article_llm_timeout_secs,
            ),
            extraction_timeout_secs: parse_or(
                "EXTRACTION_TOTAL_TIMEOUT",
                defaults.extraction_timeout_secs,
            ),
            session_ttl_hours: parse_or("SESSION_TTL_HOURS", defaults.session_ttl_hours),
            content_cache_ttl_hours: parse_or(
                "CACHE_SOCIAL_CONTENT_HOURS",
                defaults.content_cache_ttl_hours,
            ),
            respect_robots: parse_or("SCRAPER_RESPECT_ROBOTS", defaults.respect_robots),
            sources_config_path: var_or("SOURCES_CONFIG_PATH", &defaults.sources_config_path),
            google_cse_api_key: var("GOOGLE_CSE_API_KEY"),
            google_cse_id: var("GOOGLE_CSE_ID"),
            youtube_api_key: var("YOUTUBE_API_KEY"),
            twitter_bearer_token: var("TWITTER_BEARER_TOKEN"),
            facebook_access_token: var("FACEBOOK_ACCESS_TOKEN"),
            instagram_access_token: var("INSTAGRAM_ACCESS_TOKEN"),
            scrapecreators_api_key: var("SCRAPECREATORS_API_KEY"),
            twitter_scraper: var("TWITTER_SCRAPER")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            facebook_scraper: var("FACEBOOK_SCRAPER")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            instagram_scraper: var("INSTAGRAM_SCRAPER")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            match_weights,
        };

        config.validate()?;
        debug!(provider = %config.default_llm_provider, "configuration loaded");
        Ok(config)
    }

    /// Check configuration invariants.
    pub fn validate(&self) -> Result<()> {
        let sum = self.match_weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(SearchError::Config(format!(
                "relevance weights must sum to 1.0, got {:.4}",
                sum
            )));
        }
        if self.max_concurrent_llm == 0 {
            return Err(SearchError::Config(
                "MAX_CONCURRENT_LLM must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_bad_weights_rejected() {
        let mut config = Config::default();
        config.match_weights.text = 0.9;
        let result = config.validate();
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn test_zero_llm_concurrency_rejected() {
        let mut config = Config::default();
        config.max_concurrent_llm = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scraper_backend_parsing() {
        assert_eq!(
            "SCRAPECREATORS".parse::<ScraperBackend>(),
            Ok(ScraperBackend::ScrapeCreators)
        );
        assert_eq!("native".parse::<ScraperBackend>(), Ok(ScraperBackend::Native));
        assert!("other".parse::<ScraperBackend>().is_err());
    }
}
