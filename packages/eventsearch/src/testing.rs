//! Mock implementations of the trait seams, for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use llm_client::{GenerationMeta, GenerationRequest, LlmError, LlmResult, Provider};
use scraping::{
    resolve_limits, DiscoveryDefaults, EffectiveLimits, LimitOverrides, SourceConfig,
};

use crate::llm::LanguageModel;
use crate::scrape::ArticleScraper;
use crate::types::Article;

/// A language model returning canned replies.
pub struct MockLanguageModel {
    replies: Mutex<VecDeque<String>>,
    repeat_last: Option<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockLanguageModel {
    /// Always return the same reply.
    pub fn with_reply(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            repeat_last: Some(reply.to_string()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Return queued replies in order, then repeat the last one.
    pub fn with_replies(replies: Vec<String>) -> Self {
        let repeat_last = replies.last().cloned();
        Self {
            replies: Mutex::new(replies.into()),
            repeat_last,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call.
    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            repeat_last: None,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `generate` was invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        provider: Option<Provider>,
    ) -> LlmResult<(String, GenerationMeta)> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(LlmError::Provider {
                status: 500,
                message: "mock failure".to_string(),
            });
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat_last.clone())
            .ok_or(LlmError::EmptyResponse)?;

        Ok((
            reply,
            GenerationMeta {
                provider: provider.unwrap_or(Provider::Claude).as_str().to_string(),
                model: "mock-model".to_string(),
                usage: None,
                fallback_used: false,
            },
        ))
    }
}

/// A scraper serving canned discovery lists and articles.
pub struct MockScraper {
    urls_by_source: HashMap<String, Vec<String>>,
    articles_by_url: HashMap<String, Article>,
    defaults: DiscoveryDefaults,
}

impl Default for MockScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScraper {
    /// Create an empty mock scraper.
    pub fn new() -> Self {
        Self {
            urls_by_source: HashMap::new(),
            articles_by_url: HashMap::new(),
            defaults: DiscoveryDefaults::default(),
        }
    }

    /// Register discovery results for a source.
    pub fn with_urls(mut self, source_name: &str, urls: Vec<&str>) -> Self {
        self.urls_by_source
            .insert(source_name.to_string(), urls.into_iter().map(String::from).collect());
        self
    }

    /// Register an article served for a URL.
    pub fn with_article(mut self, url: &str, article: Article) -> Self {
        self.articles_by_url.insert(url.to_string(), article);
        self
    }

    /// Override the global limit defaults.
    pub fn with_defaults(mut self, defaults: DiscoveryDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

#[async_trait]
impl ArticleScraper for MockScraper {
    async fn discover(
        &self,
        source: &SourceConfig,
        _query: &str,
        overrides: &LimitOverrides,
    ) -> Vec<String> {
        let limits = self.limits_for(source, overrides);
        let mut urls = self
            .urls_by_source
            .get(&source.name)
            .cloned()
            .unwrap_or_default();
        urls.truncate(limits.max_search_results);
        urls
    }

    async fn scrape_article(&self, url: &str, _source: &SourceConfig) -> Option<Article> {
        self.articles_by_url.get(url).cloned()
    }

    fn limits_for(&self, source: &SourceConfig, overrides: &LimitOverrides) -> EffectiveLimits {
        resolve_limits(source, overrides, &self.defaults)
    }
}

/// Build a minimal enabled source config for tests.
pub fn test_source(name: &str) -> SourceConfig {
    serde_yaml::from_str(&format!(
        "name: {}\nbase_url: https://{}.example.com",
        name,
        name.to_lowercase()
    ))
    .expect("valid test source")
}
