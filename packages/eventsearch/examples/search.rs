//! Run a batch search from the command line.
//!
//! Wires the whole pipeline together at program root: registry, fetcher,
//! discovery, LLM router, matcher, session store, orchestrator.
//!
//! ```sh
//! cargo run --example search -- "bombing in kabul"
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use eventsearch::{
    Config, EventExtractor, PipelineSettings, QueryMatcher, SearchQuery, SearchService,
    SessionStore, WebScraper,
};
use llm_client::{ClaudeClient, LlmRouter, OllamaClient};
use scraping::{
    ApiSearchClient, Discovery, DiscoveryDefaults, Fetcher, LimitOverrides, RateLimiter,
    RobotsGate, SourceRegistry,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let phrase = std::env::args()
        .nth(1)
        .context("usage: search <query phrase>")?;

    let config = Config::from_env()?;

    let registry = Arc::new(
        SourceRegistry::load(&config.sources_config_path)
            .with_context(|| format!("loading sources from {}", config.sources_config_path))?,
    );

    let rate_limiter = Arc::new(RateLimiter::new());
    let robots = Arc::new(RobotsGate::new(
        reqwest::Client::new(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    ));
    let fetcher = Arc::new(Fetcher::new(rate_limiter, robots));

    let api = match (&config.google_cse_api_key, &config.google_cse_id) {
        (Some(key), Some(id)) => Some(ApiSearchClient::new(key.clone(), id.clone())),
        _ => None,
    };
    let discovery = Discovery::new(
        fetcher.clone(),
        api,
        DiscoveryDefaults {
            max_search_results: config.max_search_results,
            max_articles_to_process: config.max_articles_to_process,
        },
    );
    let scraper = Arc::new(WebScraper::new(fetcher, discovery, config.respect_robots));

    let claude = ClaudeClient::new(config.claude_api_key.clone())
        .with_default_model(config.claude_model.clone())
        .with_max_concurrent(config.claude_max_concurrent);
    let ollama = OllamaClient::new(config.ollama_base_url.clone(), config.ollama_model.clone());
    let router = LlmRouter::new(
        claude,
        ollama,
        config.default_llm_provider,
        config.enable_llm_fallback,
    );
    let extractor = Arc::new(EventExtractor::new(Arc::new(router)));

    let sessions = Arc::new(SessionStore::new());
    let service = SearchService::new(
        registry,
        scraper,
        extractor,
        QueryMatcher::new(config.match_weights),
        sessions,
        PipelineSettings::from(&config),
    );

    let response = service
        .search(
            SearchQuery::new(phrase.as_str()),
            LimitOverrides::default(),
            None,
            None,
        )
        .await;

    println!(
        "status: {:?}  events: {}  articles: {}  sources: {}  ({:.1}s)",
        response.status,
        response.total_events,
        response.articles_scraped,
        response.sources_scraped,
        response.processing_time_seconds,
    );

    for (i, event) in response.events.iter().enumerate() {
        println!(
            "{:2}. [{}] {} — {} ({:?}, confidence {:.2})",
            i + 1,
            event.event_type,
            event.title,
            event.summary.chars().take(120).collect::<String>(),
            event.location,
            event.confidence,
        );
    }

    Ok(())
}
