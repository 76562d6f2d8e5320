//! Social content aggregation: platform routing and fingerprinted caches.
//!
//! The aggregator owns two TTL caches keyed by MD5 fingerprints: one for
//! fetched social content (`platform:url`) and one for LLM analyses
//! (`analysis:url[:model]`). Platform adapters are opaque; each returns
//! a [`SocialContent`] or nothing, and an adapter with no credentials
//! disables itself silently.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::types::{EventRecord, Platform, SocialContent};

/// One platform's content fetcher.
///
/// Implementations wrap the platform's API or a third-party scraping
/// service; which backend a given adapter uses is a construction-time
/// choice the aggregator never sees. Adapters must not error outward:
/// an unconfigured or failing adapter returns `None`.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The platform this adapter serves.
    fn platform(&self) -> Platform;

    /// Whether credentials are present. Unconfigured adapters are
    /// skipped without logging errors.
    fn is_configured(&self) -> bool;

    /// Fetch content for one URL, or `None` on any failure.
    async fn fetch(&self, url: &str) -> Option<SocialContent>;
}

struct CacheEntry<T> {
    value: T,
    inserted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Cache presence report for one URL.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStatus {
    pub content_cached: bool,
    pub analysis_cached: bool,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub content_entries: usize,
    pub analysis_entries: usize,
}

/// Aggregates and caches social media content across platforms.
pub struct ContentAggregator {
    adapters: HashMap<Platform, Box<dyn PlatformAdapter>>,
    content_cache: Mutex<HashMap<String, CacheEntry<SocialContent>>>,
    analysis_cache: Mutex<HashMap<String, CacheEntry<EventRecord>>>,
    ttl: Duration,
}

impl ContentAggregator {
    /// Create an aggregator with the given adapters and cache TTL.
    pub fn new(adapters: Vec<Box<dyn PlatformAdapter>>, ttl_hours: i64) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.platform(), adapter))
            .collect();
        Self {
            adapters,
            content_cache: Mutex::new(HashMap::new()),
            analysis_cache: Mutex::new(HashMap::new()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    fn content_key(platform: Platform, url: &str) -> String {
        format!("{:x}", md5::compute(format!("{}:{}", platform.as_str(), url)))
    }

    fn analysis_key(url: &str, model: Option<&str>) -> String {
        let suffix = model.map(|m| format!(":{}", m)).unwrap_or_default();
        format!("{:x}", md5::compute(format!("analysis:{}{}", url, suffix)))
    }

    fn cached_content(&self, key: &str) -> Option<(SocialContent, DateTime<Utc>)> {
        let mut cache = self.content_cache.lock().unwrap();
        let now = Utc::now();

        match cache.get(key) {
            Some(entry) if entry.is_expired(now) => {
                cache.remove(key);
                None
            }
            Some(entry) => {
                debug!(
                    age_s = (now - entry.inserted_at).num_seconds(),
                    "content cache entry age"
                );
                Some((entry.value.clone(), entry.expires_at))
            }
            None => None,
        }
    }

    fn store_content(&self, key: String, content: SocialContent) {
        let now = Utc::now();
        self.content_cache.lock().unwrap().insert(
            key,
            CacheEntry {
                value: content,
                inserted_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Retrieve a cached analysis for a URL and model, if unexpired.
    pub fn cached_analysis(&self, url: &str, model: Option<&str>) -> Option<EventRecord> {
        let key = Self::analysis_key(url, model);
        let mut cache = self.analysis_cache.lock().unwrap();
        let now = Utc::now();

        match cache.get(&key) {
            Some(entry) if entry.is_expired(now) => {
                cache.remove(&key);
                None
            }
            Some(entry) => {
                debug!(url = %url, "analysis cache hit");
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    /// Cache an analysis result for a URL under the model it came from.
    pub fn save_analysis(&self, url: &str, event: EventRecord, model: Option<&str>) {
        let key = Self::analysis_key(url, model);
        let now = Utc::now();
        info!(url = %url, model = ?model, "caching analysis");
        self.analysis_cache.lock().unwrap().insert(
            key,
            CacheEntry {
                value: event,
                inserted_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Report whether content and analysis are cached for a URL without
    /// fetching anything.
    pub fn check_status(&self, url: &str, platform: Platform, model: Option<&str>) -> CacheStatus {
        let now = Utc::now();
        let content_cached = self
            .content_cache
            .lock()
            .unwrap()
            .get(&Self::content_key(platform, url))
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false);
        let analysis_cached = self
            .analysis_cache
            .lock()
            .unwrap()
            .get(&Self::analysis_key(url, model))
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false);

        CacheStatus {
            content_cached,
            analysis_cached,
        }
    }

    /// Fetch full content for a social media URL.
    ///
    /// Cache hits are marked `cached = true` and get the matching
    /// analysis (for the caller's model, falling back to a model-less
    /// entry) attached. Misses route to the platform's adapter and cache
    /// the result.
    pub async fn fetch_content(
        &self,
        url: &str,
        platform: Option<Platform>,
        force_refresh: bool,
        model: Option<&str>,
    ) -> Option<SocialContent> {
        let platform = match platform.or_else(|| Platform::detect(url)) {
            Some(platform) => platform,
            None => {
                warn!(url = %url, "could not detect platform");
                return None;
            }
        };

        let key = Self::content_key(platform, url);

        if !force_refresh {
            if let Some((mut content, expires_at)) = self.cached_content(&key) {
                info!(url = %url, platform = %platform, "content cache hit");
                content.cached = true;
                content.cache_expires_at = Some(expires_at);
                content.extracted_event = self
                    .cached_analysis(url, model)
                    .or_else(|| self.cached_analysis(url, None));
                return Some(content);
            }
        }

        let adapter = match self.adapters.get(&platform) {
            Some(adapter) => adapter,
            None => {
                warn!(platform = %platform, "no adapter registered");
                return None;
            }
        };
        if !adapter.is_configured() {
            debug!(platform = %platform, "adapter not configured, skipping");
            return None;
        }

        let content = adapter.fetch(url).await;
        match &content {
            Some(content) => {
                debug!(url = %url, platform = %platform, "fetched and caching");
                self.store_content(key, content.clone());
            }
            None => warn!(url = %url, platform = %platform, "no content retrieved"),
        }

        content
    }

    /// Current cache sizes (expired entries included until touched).
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            content_entries: self.content_cache.lock().unwrap().len(),
            analysis_entries: self.analysis_cache.lock().unwrap().len(),
        }
    }

    /// Drop every cached entry.
    pub fn clear_caches(&self) {
        self.content_cache.lock().unwrap().clear();
        self.analysis_cache.lock().unwrap().clear();
    }

    #[cfg(test)]
    fn expire_all(&self) {
        let past = Utc::now() - Duration::hours(1);
        for entry in self.content_cache.lock().unwrap().values_mut() {
            entry.expires_at = past;
        }
        for entry in self.analysis_cache.lock().unwrap().values_mut() {
            entry.expires_at = past;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, Location, SocialAuthor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedAdapter {
        platform: Platform,
        configured: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PlatformAdapter for FixedAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn fetch(&self, url: &str) -> Option<SocialContent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(content(self.platform, url))
        }
    }

    fn content(platform: Platform, url: &str) -> SocialContent {
        SocialContent {
            platform,
            content_type: "post".to_string(),
            url: url.to_string(),
            platform_id: "id1".to_string(),
            text: "A post about an event".to_string(),
            title: None,
            description: None,
            author: SocialAuthor::default(),
            posted_at: None,
            media: vec![],
            engagement: Default::default(),
            platform_data: HashMap::new(),
            extracted_event: None,
            cached: false,
            cache_expires_at: None,
        }
    }

    fn analysis() -> EventRecord {
        EventRecord {
            event_type: EventType::Protest,
            event_sub_type: None,
            title: "Protest".to_string(),
            summary: "A protest happened.".to_string(),
            perpetrator: None,
            perpetrator_type: None,
            location: Location::default(),
            event_date: None,
            event_time: None,
            participants: vec![],
            organizations: vec![],
            casualties: None,
            source_name: None,
            source_url: None,
            article_published_date: None,
            collection_timestamp: None,
            confidence: 0.7,
            full_content: None,
        }
    }

    fn aggregator(configured: bool) -> ContentAggregator {
        ContentAggregator::new(
            vec![Box::new(FixedAdapter {
                platform: Platform::Twitter,
                configured,
                calls: AtomicUsize::new(0),
            })],
            24,
        )
    }

    #[tokio::test]
    async fn test_fetch_then_cache_hit() {
        let agg = aggregator(true);
        let url = "https://twitter.com/user/status/1";

        let first = agg.fetch_content(url, None, false, None).await.unwrap();
        assert!(!first.cached);

        let second = agg.fetch_content(url, None, false, None).await.unwrap();
        assert!(second.cached);
        assert!(second.cache_expires_at.is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_misses() {
        let agg = aggregator(true);
        let url = "https://twitter.com/user/status/1";

        agg.fetch_content(url, None, false, None).await.unwrap();
        agg.expire_all();

        let refetched = agg.fetch_content(url, None, false, None).await.unwrap();
        assert!(!refetched.cached);
    }

    #[tokio::test]
    async fn test_unconfigured_adapter_returns_none() {
        let agg = aggregator(false);
        let result = agg
            .fetch_content("https://twitter.com/user/status/1", None, false, None)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_platform_returns_none() {
        let agg = aggregator(true);
        let result = agg
            .fetch_content("https://example.com/article", None, false, None)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_analysis_attached_on_cache_hit() {
        let agg = aggregator(true);
        let url = "https://twitter.com/user/status/1";

        agg.fetch_content(url, None, false, None).await.unwrap();
        agg.save_analysis(url, analysis(), Some("model-a"));

        let hit = agg
            .fetch_content(url, None, false, Some("model-a"))
            .await
            .unwrap();
        assert!(hit.extracted_event.is_some());

        // Different model falls back to a model-less entry only.
        let other = agg
            .fetch_content(url, None, false, Some("model-b"))
            .await
            .unwrap();
        assert!(other.extracted_event.is_none());
    }

    #[test]
    fn test_check_status() {
        let agg = aggregator(true);
        let url = "https://twitter.com/user/status/1";

        let before = agg.check_status(url, Platform::Twitter, None);
        assert!(!before.content_cached);
        assert!(!before.analysis_cached);

        agg.save_analysis(url, analysis(), None);
        let after = agg.check_status(url, Platform::Twitter, None);
        assert!(after.analysis_cached);
        assert!(!after.content_cached);
    }

    #[test]
    fn test_fingerprints_are_distinct() {
        let url = "https://twitter.com/user/status/1";
        assert_ne!(
            ContentAggregator::content_key(Platform::Twitter, url),
            ContentAggregator::content_key(Platform::Facebook, url)
        );
        assert_ne!(
            ContentAggregator::analysis_key(url, None),
            ContentAggregator::analysis_key(url, Some("model-a"))
        );
    }

    #[test]
    fn test_cache_stats_and_clear() {
        let agg = aggregator(true);
        agg.save_analysis("https://twitter.com/a", analysis(), None);
        assert_eq!(agg.cache_stats().analysis_entries, 1);
        agg.clear_caches();
        assert_eq!(agg.cache_stats().analysis_entries, 0);
    }
}
