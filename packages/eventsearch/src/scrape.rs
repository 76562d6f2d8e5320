//! Article acquisition seam for the orchestrator.
//!
//! [`WebScraper`] is the production implementation composing discovery,
//! the polite fetcher, and HTML extraction. The trait exists so pipeline
//! tests can substitute canned articles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraping::{
    html, Discovery, EffectiveLimits, FetchOptions, Fetcher, LimitOverrides, SourceConfig,
};
use tracing::{debug, info, warn};

use crate::types::Article;

/// Discovers candidate URLs and scrapes them into articles.
#[async_trait]
pub trait ArticleScraper: Send + Sync {
    /// Candidate URLs for a query from one source, capped by the
    /// source's effective limits.
    async fn discover(
        &self,
        source: &SourceConfig,
        query: &str,
        overrides: &LimitOverrides,
    ) -> Vec<String>;

    /// Fetch and extract one article. `None` on any failure.
    async fn scrape_article(&self, url: &str, source: &SourceConfig) -> Option<Article>;

    /// Effective limits for one source.
    fn limits_for(&self, source: &SourceConfig, overrides: &LimitOverrides) -> EffectiveLimits;
}

/// Production scraper over the discovery and fetch layers.
pub struct WebScraper {
    fetcher: Arc<Fetcher>,
    discovery: Discovery,
    respect_robots: bool,
}

impl WebScraper {
    /// Create a scraper.
    pub fn new(fetcher: Arc<Fetcher>, discovery: Discovery, respect_robots: bool) -> Self {
        Self {
            fetcher,
            discovery,
            respect_robots,
        }
    }

    /// Selector subset used for article pages (the `article_links`
    /// selector belongs to discovery, not extraction).
    fn article_selectors(source: &SourceConfig) -> HashMap<String, String> {
        source
            .selectors
            .iter()
            .filter(|(field, _)| {
                matches!(field.as_str(), "title" | "content" | "date" | "author")
            })
            .map(|(field, selector)| (field.clone(), selector.clone()))
            .collect()
    }
}

#[async_trait]
impl ArticleScraper for WebScraper {
    async fn discover(
        &self,
        source: &SourceConfig,
        query: &str,
        overrides: &LimitOverrides,
    ) -> Vec<String> {
        self.discovery.discover(source, query, overrides).await
    }

    async fn scrape_article(&self, url: &str, source: &SourceConfig) -> Option<Article> {
        // Relative links resolve against the source root.
        let url = if url.starts_with('/') {
            format!("{}{}", source.base_url.trim_end_matches('/'), url)
        } else {
            url.to_string()
        };

        let options = FetchOptions {
            headers: source.headers.clone(),
            respect_robots: self.respect_robots,
            min_interval: Duration::from_secs_f64(source.rate_limit),
            ..FetchOptions::default()
        };

        let page = match self.fetcher.fetch(&url, &options).await {
            Ok(body) => body,
            Err(e) => {
                debug!(url = %url, error = %e, "article fetch failed");
                return None;
            }
        };

        let selectors = Self::article_selectors(source);
        let extracted = if selectors.is_empty() {
            html::extract_generic(&page)
        } else {
            html::extract_with_selectors(&page, &selectors)
        };

        let title = extracted
            .get("title")
            .and_then(|t| t.as_deref())
            .map(html::clean_text)
            .filter(|t| !t.is_empty());
        let content = extracted
            .get("content")
            .and_then(|c| c.as_deref())
            .map(html::clean_text)
            .unwrap_or_default();

        if !html::is_valid_content(&content) {
            warn!(url = %url, "insufficient article content");
            return None;
        }

        let mut article = Article::new(&url, content, &source.name);
        if let Some(title) = title {
            article = article.with_title(title);
        }
        if let Some(author) = extracted
            .get("author")
            .and_then(|a| a.as_deref())
            .map(html::clean_text)
            .filter(|a| !a.is_empty())
        {
            article = article.with_author(author);
        }

        info!(url = %url, source = %source.name, "scraped article");
        Some(article)
    }

    fn limits_for(&self, source: &SourceConfig, overrides: &LimitOverrides) -> EffectiveLimits {
        self.discovery.limits_for(source, overrides)
    }
}
