//! The search orchestrator: discovery, extraction, matching, delivery.
//!
//! Two shapes over one pipeline. Batch runs to completion with bounded
//! parallelism in the extraction stage and returns the filled session.
//! Streaming processes articles strictly sequentially so events are
//! emitted in discovery order, and polls the session's cancellation flag
//! at every suspension point; the expensive LLM call is fenced on both
//! sides.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use llm_client::Provider;
use scraping::{LimitOverrides, SourceConfig, SourceRegistry};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::extractor::EventExtractor;
use crate::matcher::QueryMatcher;
use crate::scrape::ArticleScraper;
use crate::session::{SessionStatus, SessionStore};
use crate::types::{
    Article, EventRecord, SearchOutcome, SearchQuery, SearchResponse, StreamFrame,
};

/// Knobs for one service instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Events below this relevance are dropped
    pub min_relevance_score: f64,

    /// Parallel extraction workers in batch mode
    pub max_concurrent_llm: usize,

    /// Deadline for one article's extraction in batch mode
    pub article_timeout: Duration,

    /// Soft budget for the whole extraction stage in batch mode
    pub extraction_budget: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_relevance_score: 0.1,
            max_concurrent_llm: 4,
            article_timeout: Duration::from_secs(60),
            extraction_budget: Duration::from_secs(300),
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            min_relevance_score: 0.1,
            max_concurrent_llm: config.max_concurrent_llm,
            article_timeout: Duration::from_secs(config.article_llm_timeout_secs),
            extraction_budget: Duration::from_secs(config.extraction_timeout_secs),
        }
    }
}

/// Orchestrates the end-to-end search pipeline.
///
/// All collaborators are injected at construction; the service holds no
/// global state beyond the session store it was given.
pub struct SearchService {
    registry: Arc<SourceRegistry>,
    scraper: Arc<dyn ArticleScraper>,
    extractor: Arc<EventExtractor>,
    matcher: QueryMatcher,
    sessions: Arc<SessionStore>,
    settings: PipelineSettings,
}

impl SearchService {
    /// Wire up a service from its collaborators.
    pub fn new(
        registry: Arc<SourceRegistry>,
        scraper: Arc<dyn ArticleScraper>,
        extractor: Arc<EventExtractor>,
        matcher: QueryMatcher,
        sessions: Arc<SessionStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            scraper,
            extractor,
            matcher,
            sessions,
            settings,
        }
    }

    /// The session store this service appends to.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Retrieve a session, surfacing a not-found error for the caller to
    /// map to its 404 equivalent.
    pub fn get_session(&self, id: &str) -> crate::error::Result<crate::session::Session> {
        self.sessions
            .get_session(id)
            .ok_or_else(|| crate::error::SearchError::SessionNotFound { id: id.to_string() })
    }

    /// Retrieve just a session's results.
    pub fn get_session_results(&self, id: &str) -> crate::error::Result<Vec<EventRecord>> {
        self.sessions
            .get_results(id)
            .ok_or_else(|| crate::error::SearchError::SessionNotFound { id: id.to_string() })
    }

    /// Cancel a running session. The flag is observed at the pipeline's
    /// next suspension point.
    pub fn cancel_session(&self, id: &str) -> crate::error::Result<()> {
        if self.sessions.get_session(id).is_none() {
            return Err(crate::error::SearchError::SessionNotFound { id: id.to_string() });
        }
        self.sessions.cancel(id);
        Ok(())
    }

    /// Append a date-context token so upstream search engines surface
    /// articles from the requested window; `recent` otherwise.
    fn enrich_phrase(query: &SearchQuery) -> String {
        match (query.date_from, query.date_to) {
            (Some(from), Some(to)) => {
                let from_str = from.format("%B %Y").to_string();
                let to_str = to.format("%B %Y").to_string();
                if from_str == to_str {
                    format!("{} {}", query.phrase, from_str)
                } else {
                    format!("{} {} to {}", query.phrase, from_str, to_str)
                }
            }
            (Some(from), None) => format!("{} after {}", query.phrase, from.format("%B %Y")),
            (None, Some(to)) => format!("{} before {}", query.phrase, to.format("%B %Y")),
            (None, None) => format!("{} recent", query.phrase),
        }
    }

    /// Discovery fan-out plus article scraping, in source order.
    ///
    /// URLs are deduplicated across sources by exact match. The
    /// cancellation flag is polled between sources and between articles;
    /// on cancellation the articles collected so far are returned.
    async fn scrape_articles(
        &self,
        sources: &[&SourceConfig],
        phrase: &str,
        overrides: &LimitOverrides,
        session_id: Option<&str>,
    ) -> Vec<Article> {
        let mut articles = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        let is_cancelled = |sessions: &SessionStore| {
            session_id
                .map(|id| sessions.is_cancelled(id))
                .unwrap_or(false)
        };

        for source in sources {
            if is_cancelled(&self.sessions) {
                warn!(source = %source.name, "cancelled during scraping, returning partial set");
                return articles;
            }
            if !source.enabled {
                continue;
            }

            let limits = self.scraper.limits_for(source, overrides);
            let urls = self.scraper.discover(source, phrase, overrides).await;
            let mut scraped = 0usize;
            let mut failed = 0usize;

            for url in urls {
                if is_cancelled(&self.sessions) {
                    warn!(source = %source.name, "cancelled between articles");
                    return articles;
                }
                if scraped >= limits.max_articles_to_process {
                    break;
                }
                if !seen_urls.insert(url.clone()) {
                    debug!(url = %url, "skipping duplicate URL");
                    continue;
                }

                match self.scraper.scrape_article(&url, source).await {
                    Some(article) => {
                        articles.push(article);
                        scraped += 1;
                    }
                    None => failed += 1,
                }
            }

            info!(
                source = %source.name,
                scraped, failed,
                "source scraping complete"
            );
        }

        info!(total = articles.len(), "scraped articles");
        articles
    }

    /// Extraction stage for batch mode: up to `max_concurrent_llm`
    /// articles in flight, each under the per-article timeout, all under
    /// the stage budget. Articles left when the budget runs out are
    /// abandoned.
    async fn extract_parallel(
        &self,
        articles: &[Article],
        provider: Option<Provider>,
        model: Option<&str>,
    ) -> Vec<EventRecord> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_llm));
        let deadline = Instant::now() + self.settings.extraction_budget;

        let tasks = articles.iter().enumerate().map(|(index, article)| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.ok()?;

                let remaining = deadline.checked_duration_since(Instant::now())?;
                let timeout = remaining.min(self.settings.article_timeout);

                match tokio::time::timeout(
                    timeout,
                    self.extractor.extract_from_article(article, provider, model),
                )
                .await
                {
                    Ok(extraction) => extraction.event,
                    Err(_) => {
                        warn!(
                            index = index + 1,
                            title = %article.title_or_untitled(),
                            "extraction timed out"
                        );
                        None
                    }
                }
            }
        });

        let events: Vec<EventRecord> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect();

        info!(
            extracted = events.len(),
            articles = articles.len(),
            "extraction stage complete"
        );
        events
    }

    /// Run the pipeline to completion and return the filled session.
    pub async fn search(
        &self,
        query: SearchQuery,
        overrides: LimitOverrides,
        provider: Option<Provider>,
        model: Option<&str>,
    ) -> SearchResponse {
        let start = Instant::now();
        let phrase = Self::enrich_phrase(&query);
        info!(phrase = %phrase, original = %query.phrase, "starting search");

        let response = |session_id: String,
                        events: Vec<EventRecord>,
                        articles_scraped: usize,
                        sources_scraped: usize,
                        status: SearchOutcome,
                        message: String| {
            let total_events = events.len();
            SearchResponse {
                session_id,
                events,
                query: query.clone(),
                total_events,
                processing_time_seconds: start.elapsed().as_secs_f64(),
                articles_scraped,
                sources_scraped,
                status,
                message,
            }
        };

        let sources = self.registry.list(true);
        if sources.is_empty() {
            warn!("no enabled sources");
            return response(
                String::new(),
                Vec::new(),
                0,
                0,
                SearchOutcome::NoSources,
                "No enabled sources configured".to_string(),
            );
        }

        let articles = self
            .scrape_articles(&sources, &phrase, &overrides, None)
            .await;
        if articles.is_empty() {
            return response(
                String::new(),
                Vec::new(),
                0,
                sources.len(),
                SearchOutcome::NoArticles,
                "No articles could be scraped from sources".to_string(),
            );
        }

        let events = self.extract_parallel(&articles, provider, model).await;
        if events.is_empty() {
            return response(
                String::new(),
                Vec::new(),
                articles.len(),
                sources.len(),
                SearchOutcome::NoEvents,
                "No events could be extracted from articles".to_string(),
            );
        }

        let matched: Vec<EventRecord> = self
            .matcher
            .match_events(events, &query, self.settings.min_relevance_score)
            .into_iter()
            .map(|scored| scored.event)
            .collect();

        let session_id = self
            .sessions
            .create_with_status(query.clone(), SessionStatus::Completed);
        for event in &matched {
            self.sessions.add_result(&session_id, event.clone());
        }

        let message = format!("Found {} relevant events", matched.len());
        info!(
            session_id = %session_id,
            events = matched.len(),
            elapsed_s = start.elapsed().as_secs_f64(),
            "search complete"
        );

        response(
            session_id,
            matched,
            articles.len(),
            sources.len(),
            SearchOutcome::Success,
            message,
        )
    }

    /// Run the pipeline, yielding frames as work proceeds.
    ///
    /// The caller creates the session beforehand so the id can reach the
    /// client before pipeline work begins. Events are emitted as soon as
    /// each is accepted; articles are processed sequentially to preserve
    /// emission order.
    pub fn search_stream<'a>(
        &'a self,
        query: SearchQuery,
        session_id: String,
        overrides: LimitOverrides,
        provider: Option<Provider>,
        model: Option<String>,
    ) -> impl Stream<Item = StreamFrame> + 'a {
        async_stream::stream! {
            let start = Instant::now();
            let phrase = Self::enrich_phrase(&query);
            info!(session_id = %session_id, phrase = %phrase, "starting streaming search");

            self.sessions.set_status(&session_id, SessionStatus::Processing);

            yield StreamFrame::progress(0, 100, 0.0, "Loading sources...");

            let sources = self.registry.list(true);
            if sources.is_empty() {
                error!(session_id = %session_id, "no enabled sources");
                self.sessions.set_status(&session_id, SessionStatus::Error);
                yield StreamFrame::Error {
                    message: "No enabled sources configured".to_string(),
                };
                return;
            }

            yield StreamFrame::progress(
                10,
                100,
                10.0,
                format!("Scraping articles from {} source(s)...", sources.len()),
            );

            if self.sessions.is_cancelled(&session_id) {
                yield StreamFrame::Cancelled {
                    message: "Search cancelled by user".to_string(),
                    total_events: 0,
                };
                return;
            }

            let articles = self
                .scrape_articles(&sources, &phrase, &overrides, Some(&session_id))
                .await;

            if self.sessions.is_cancelled(&session_id) {
                yield StreamFrame::Cancelled {
                    message: "Search cancelled by user".to_string(),
                    total_events: 0,
                };
                return;
            }

            if articles.is_empty() {
                self.sessions.set_status(&session_id, SessionStatus::Completed);
                yield StreamFrame::Complete {
                    message: "No articles found".to_string(),
                    total_events: 0,
                    articles_processed: 0,
                    processing_time: start.elapsed().as_secs_f64(),
                };
                return;
            }

            let total_articles = articles.len();
            yield StreamFrame::progress(
                20,
                100,
                20.0,
                format!("Processing {} article(s)...", total_articles),
            );

            let mut extracted_count = 0usize;

            for (i, article) in articles.iter().enumerate() {
                let article_index = i + 1;

                if self.sessions.is_cancelled(&session_id) {
                    yield StreamFrame::Cancelled {
                        message: format!(
                            "Search cancelled. Extracted {} event(s).",
                            extracted_count
                        ),
                        total_events: extracted_count,
                    };
                    return;
                }

                // 0-20 is reserved for source load and discovery, 90-100
                // for completion; extraction owns the middle band.
                let percentage = 20.0 + article_index as f64 / total_articles as f64 * 70.0;
                let message = format!(
                    "Processing article {}/{}: {}...",
                    article_index,
                    total_articles,
                    article.title_or_untitled().chars().take(50).collect::<String>()
                );
                self.sessions
                    .update_progress(&session_id, article_index, total_articles, &message);
                yield StreamFrame::progress(
                    article_index,
                    total_articles,
                    (percentage * 10.0).round() / 10.0,
                    message,
                );

                // The LLM call is the expensive step: fence it on both sides.
                if self.sessions.is_cancelled(&session_id) {
                    yield StreamFrame::Cancelled {
                        message: format!(
                            "Search cancelled. Extracted {} event(s).",
                            extracted_count
                        ),
                        total_events: extracted_count,
                    };
                    return;
                }

                let extraction = self
                    .extractor
                    .extract_from_article(article, provider, model.as_deref())
                    .await;

                if self.sessions.is_cancelled(&session_id) {
                    // In-flight work ran to completion; its result is dropped.
                    yield StreamFrame::Cancelled {
                        message: format!(
                            "Search cancelled. Extracted {} event(s).",
                            extracted_count
                        ),
                        total_events: extracted_count,
                    };
                    return;
                }

                let Some(event) = extraction.event else {
                    debug!(article_index, reason = ?extraction.meta.skip_reason, "no event");
                    continue;
                };

                let mut matched = self.matcher.match_events(
                    vec![event],
                    &query,
                    self.settings.min_relevance_score,
                );
                let Some(scored) = matched.pop() else {
                    debug!(article_index, "event below relevance threshold");
                    continue;
                };

                self.sessions.add_result(&session_id, scored.event.clone());
                extracted_count += 1;

                yield StreamFrame::Event {
                    event: Box::new(scored.event),
                    index: extracted_count,
                    article_index,
                    total_articles,
                };
            }

            let processing_time = start.elapsed().as_secs_f64();
            self.sessions.set_status(&session_id, SessionStatus::Completed);
            self.sessions.update_progress(
                &session_id,
                total_articles,
                total_articles,
                &format!("Completed! Found {} event(s).", extracted_count),
            );

            info!(
                session_id = %session_id,
                events = extracted_count,
                elapsed_s = processing_time,
                "streaming search complete"
            );

            yield StreamFrame::Complete {
                message: format!("Search completed. Found {} event(s).", extracted_count),
                total_events: extracted_count,
                articles_processed: total_articles,
                processing_time,
            };
        }
    }
}
