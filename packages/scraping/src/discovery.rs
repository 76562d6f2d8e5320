//! Discovery: turning a query into candidate article URLs.
//!
//! Two backends. API discovery pages through a custom-search endpoint
//! (hard upstream cap of 10 results per request) and filters out
//! social/video platforms, which cannot be scraped as articles. HTML
//! discovery fetches the rendered search page for a source and harvests
//! links with the source's `article_links` selector.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::fetch::{FetchOptions, Fetcher, HttpMethod};
use crate::html;
use crate::sources::SourceConfig;

/// Platforms filtered out of API search results.
const EXCLUDED_DOMAINS: [&str; 11] = [
    "youtube.com",
    "youtu.be",
    "facebook.com",
    "fb.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "tiktok.com",
    "vimeo.com",
    "linkedin.com/posts",
    "reddit.com/r/",
];

/// The upstream search API returns at most this many results per request.
const API_PAGE_SIZE: usize = 10;

/// Cap on API requests for a single discovery run (100 results).
const API_MAX_PAGES: usize = 10;

/// Global fallback caps used when neither the caller nor the source
/// configuration specifies limits.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryDefaults {
    pub max_search_results: usize,
    pub max_articles_to_process: usize,
}

impl Default for DiscoveryDefaults {
    fn default() -> Self {
        Self {
            max_search_results: 10,
            max_articles_to_process: 5,
        }
    }
}

/// Caller-supplied limit overrides for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitOverrides {
    pub max_search_results: Option<usize>,
    pub max_articles_to_process: Option<usize>,
}

/// Limits after resolution for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveLimits {
    pub max_search_results: usize,
    pub max_articles_to_process: usize,
}

/// Resolve effective limits: caller override > source cap > global default.
///
/// A zero `max_search_results` falls back to the default, and the result
/// is raised to `max_articles_to_process` when smaller so the pipeline
/// can always find enough candidates to fill its article budget.
pub fn resolve_limits(
    source: &SourceConfig,
    overrides: &LimitOverrides,
    defaults: &DiscoveryDefaults,
) -> EffectiveLimits {
    let mut max_search_results = overrides
        .max_search_results
        .or(source.max_search_results)
        .unwrap_or(defaults.max_search_results);
    let max_articles_to_process = overrides
        .max_articles_to_process
        .or(source.max_articles_to_process)
        .unwrap_or(defaults.max_articles_to_process);

    if max_search_results == 0 {
        warn!(
            source = %source.name,
            "max_search_results is zero, using default {}",
            defaults.max_search_results
        );
        max_search_results = defaults.max_search_results;
    }

    if max_search_results < max_articles_to_process {
        debug!(
            source = %source.name,
            max_search_results,
            max_articles_to_process,
            "raising max_search_results to match articles cap"
        );
        max_search_results = max_articles_to_process;
    }

    EffectiveLimits {
        max_search_results,
        max_articles_to_process,
    }
}

fn is_excluded(url: &str) -> bool {
    let lower = url.to_lowercase();
    EXCLUDED_DOMAINS.iter().any(|domain| lower.contains(domain))
}

#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    items: Vec<ApiSearchItem>,
}

#[derive(Debug, Deserialize)]
struct ApiSearchItem {
    #[serde(default)]
    link: Option<String>,
}

/// Client for the paged custom-search API backend.
pub struct ApiSearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl ApiSearchClient {
    /// Create a client for the standard custom-search endpoint.
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        }
    }

    /// Override the endpoint (for tests or proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Search the API, paging as needed, and return up to `max_results`
    /// deduplicated article URLs with social/video platforms filtered out.
    pub async fn discover(&self, query: &str, max_results: usize) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut filtered = 0usize;

        let pages = (max_results + API_PAGE_SIZE - 1) / API_PAGE_SIZE;
        let pages = pages.min(API_MAX_PAGES);

        info!(query = %query, target = max_results, pages, "API discovery starting");

        for page in 0..pages {
            if urls.len() >= max_results {
                break;
            }

            let start = page * API_PAGE_SIZE + 1;
            let num = (max_results - urls.len() + filtered).min(API_PAGE_SIZE);
            let num_param = num.to_string();
            let start_param = start.to_string();

            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("cx", self.engine_id.as_str()),
                    ("q", query),
                    ("num", num_param.as_str()),
                    ("start", start_param.as_str()),
                ])
                .send()
                .await;

            let response = match response {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    warn!(status = %r.status(), "search API error, stopping pagination");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "search API request failed, stopping pagination");
                    break;
                }
            };

            let body: ApiSearchResponse = match response.json().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "search API returned invalid JSON");
                    break;
                }
            };

            if body.items.is_empty() {
                break;
            }
            let returned = body.items.len();

            for item in body.items {
                let Some(link) = item.link else { continue };
                if !seen.insert(link.clone()) {
                    continue;
                }
                if is_excluded(&link) {
                    filtered += 1;
                    continue;
                }
                urls.push(link);
                if urls.len() >= max_results {
                    break;
                }
            }

            // Upstream returned a short page: no more results exist.
            if returned < num {
                break;
            }
        }

        info!(
            found = urls.len(),
            filtered, "API discovery complete"
        );
        urls
    }
}

/// Discovery over all configured backends.
pub struct Discovery {
    fetcher: Arc<Fetcher>,
    api: Option<ApiSearchClient>,
    defaults: DiscoveryDefaults,
}

impl Discovery {
    /// Create a discovery frontend. `api` is `None` when API credentials
    /// are not configured; api-based sources then yield no URLs.
    pub fn new(
        fetcher: Arc<Fetcher>,
        api: Option<ApiSearchClient>,
        defaults: DiscoveryDefaults,
    ) -> Self {
        Self {
            fetcher,
            api,
            defaults,
        }
    }

    /// Global default limits.
    pub fn defaults(&self) -> DiscoveryDefaults {
        self.defaults
    }

    /// Resolve the effective limits for one source.
    pub fn limits_for(&self, source: &SourceConfig, overrides: &LimitOverrides) -> EffectiveLimits {
        resolve_limits(source, overrides, &self.defaults)
    }

    /// Produce an ordered candidate URL list for `query` from one source,
    /// capped at the source's effective `max_search_results`.
    pub async fn discover(
        &self,
        source: &SourceConfig,
        query: &str,
        overrides: &LimitOverrides,
    ) -> Vec<String> {
        let limits = self.limits_for(source, overrides);

        if source.api_based {
            match &self.api {
                Some(api) => api.discover(query, limits.max_search_results).await,
                None => {
                    warn!(source = %source.name, "API source configured but no API credentials");
                    Vec::new()
                }
            }
        } else {
            self.discover_html(source, query, limits.max_search_results)
                .await
        }
    }

    async fn discover_html(
        &self,
        source: &SourceConfig,
        query: &str,
        max_results: usize,
    ) -> Vec<String> {
        let Some(template) = source.search_url_template.as_deref() else {
            warn!(source = %source.name, "no search URL template");
            return Vec::new();
        };

        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let search_url = template.replace("{query}", &encoded);

        let form = source.request_data.as_ref().map(|data| {
            data.iter()
                .map(|(k, v)| (k.clone(), v.replace("{query}", query)))
                .collect()
        });

        let options = FetchOptions {
            method: source.request_method,
            headers: source.headers.clone(),
            form: if source.request_method == HttpMethod::Post {
                form
            } else {
                None
            },
            respect_robots: false,
            min_interval: Duration::from_secs_f64(source.rate_limit),
        };

        info!(source = %source.name, url = %search_url, method = ?source.request_method, "HTML discovery");

        let html = match self.fetcher.fetch(&search_url, &options).await {
            Ok(body) => body,
            Err(e) => {
                warn!(source = %source.name, error = %e, "search page fetch failed");
                return Vec::new();
            }
        };

        let selector = source
            .selectors
            .get("article_links")
            .map(String::as_str)
            .unwrap_or("a");

        let mut links = html::extract_links(&html, selector);
        links.truncate(max_results);

        info!(source = %source.name, count = links.len(), "HTML discovery complete");
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(msr: Option<usize>, map: Option<usize>) -> SourceConfig {
        let yaml = "name: Test\nbase_url: https://example.com";
        let mut config: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        config.max_search_results = msr;
        config.max_articles_to_process = map;
        config
    }

    #[test]
    fn test_limits_use_defaults() {
        let limits = resolve_limits(
            &source(None, None),
            &LimitOverrides::default(),
            &DiscoveryDefaults::default(),
        );
        assert_eq!(limits.max_search_results, 10);
        assert_eq!(limits.max_articles_to_process, 5);
    }

    #[test]
    fn test_limits_source_overrides_default() {
        let limits = resolve_limits(
            &source(Some(30), Some(8)),
            &LimitOverrides::default(),
            &DiscoveryDefaults::default(),
        );
        assert_eq!(limits.max_search_results, 30);
        assert_eq!(limits.max_articles_to_process, 8);
    }

    #[test]
    fn test_limits_param_overrides_source() {
        let overrides = LimitOverrides {
            max_search_results: Some(4),
            max_articles_to_process: Some(2),
        };
        let limits = resolve_limits(
            &source(Some(30), Some(8)),
            &overrides,
            &DiscoveryDefaults::default(),
        );
        assert_eq!(limits.max_search_results, 4);
        assert_eq!(limits.max_articles_to_process, 2);
    }

    #[test]
    fn test_search_results_raised_to_articles_cap() {
        let limits = resolve_limits(
            &source(Some(3), Some(7)),
            &LimitOverrides::default(),
            &DiscoveryDefaults::default(),
        );
        assert_eq!(limits.max_search_results, 7);
    }

    #[test]
    fn test_zero_search_results_falls_back() {
        let limits = resolve_limits(
            &source(Some(0), None),
            &LimitOverrides::default(),
            &DiscoveryDefaults::default(),
        );
        assert_eq!(limits.max_search_results, 10);
    }

    #[test]
    fn test_excluded_domains() {
        assert!(is_excluded("https://www.youtube.com/watch?v=abc"));
        assert!(is_excluded("https://x.com/user/status/1"));
        assert!(is_excluded("https://www.reddit.com/r/news/comments/1"));
        assert!(!is_excluded("https://www.bbc.com/news/world-1234"));
        assert!(!is_excluded("https://www.reddit.com/about"));
    }
}
