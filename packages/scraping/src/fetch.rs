//! Single-attempt HTTP fetcher with pacing, robots compliance, and
//! encoding recovery.
//!
//! Retries are deliberately absent: a failed URL is skipped so the
//! pipeline's total time stays bounded. Retrying is an orchestrator
//! decision, not a fetcher one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::encoding::decode_body;
use crate::error::{FetchError, FetchResult};
use crate::rate_limit::RateLimiter;
use crate::robots::RobotsGate;

/// Desktop browser User-Agents rotated round-robin to blur fingerprinting.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

/// Browser-like headers sent with GET requests.
const BROWSER_HEADERS: [(&str, &str); 7] = [
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("DNT", "1"),
];

/// HTTP method for a source request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HttpMethod {
    #[default]
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

/// Options for a single fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// GET or POST
    pub method: HttpMethod,

    /// Extra headers, applied after the defaults
    pub headers: HashMap<String, String>,

    /// Form payload for POST requests
    pub form: Option<HashMap<String, String>>,

    /// Consult the robots gate before fetching
    pub respect_robots: bool,

    /// Minimum interval between requests to this URL's domain
    pub min_interval: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            headers: HashMap::new(),
            form: None,
            respect_robots: false,
            min_interval: Duration::from_secs(1),
        }
    }
}

impl FetchOptions {
    /// Use POST with the given form payload.
    pub fn post(form: HashMap<String, String>) -> Self {
        Self {
            method: HttpMethod::Post,
            form: Some(form),
            ..Self::default()
        }
    }

    /// Set extra headers.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Enable or disable the robots gate for this fetch.
    pub fn with_respect_robots(mut self, respect: bool) -> Self {
        self.respect_robots = respect;
        self
    }

    /// Set the per-domain minimum interval.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }
}

/// Polite HTTP fetcher.
///
/// Every request passes through the per-domain rate limiter; the limiter
/// is the global serialisation point for outbound HTTP, so the fetcher is
/// safe to share across parallel pipeline workers.
pub struct Fetcher {
    client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    robots: Arc<RobotsGate>,
    ua_index: AtomicUsize,
}

impl Fetcher {
    /// Create a fetcher with the default 30 s request timeout.
    pub fn new(rate_limiter: Arc<RateLimiter>, robots: Arc<RobotsGate>) -> Self {
        Self::with_timeout(rate_limiter, robots, Duration::from_secs(30))
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(
        rate_limiter: Arc<RateLimiter>,
        robots: Arc<RobotsGate>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();

        Self {
            client,
            rate_limiter,
            robots,
            ua_index: AtomicUsize::new(0),
        }
    }

    fn next_user_agent(&self) -> &'static str {
        let idx = self.ua_index.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[idx % USER_AGENTS.len()]
    }

    /// Headers for one request. POST requests carry ONLY a User-Agent:
    /// one search backend detects bots by header combinations, and a bare
    /// UA is the combination that passes. GET requests look like a
    /// browser navigation arriving from a search engine.
    fn build_headers(
        &self,
        method: HttpMethod,
        custom: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut headers = HashMap::new();

        match method {
            HttpMethod::Post => {
                headers.insert("User-Agent".to_string(), self.next_user_agent().to_string());
            }
            HttpMethod::Get => {
                for (name, value) in BROWSER_HEADERS {
                    headers.insert(name.to_string(), value.to_string());
                }
                headers.insert("User-Agent".to_string(), self.next_user_agent().to_string());
                headers.insert(
                    "Referer".to_string(),
                    "https://www.google.com/".to_string(),
                );
            }
        }

        for (name, value) in custom {
            headers.insert(name.clone(), value.clone());
        }

        headers
    }

    /// Fetch a URL and return its decoded body.
    ///
    /// Order of gates: robots verdict (when enabled), per-domain rate
    /// limit (raised to the robots crawl delay when that is larger), then
    /// a 100-500 ms jitter before the request goes out.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<String> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        let domain = parsed
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl {
                url: url.to_string(),
            })?
            .to_string();

        let mut min_interval = options.min_interval;
        if options.respect_robots {
            let verdict = self.robots.can_fetch(url).await;
            if !verdict.allowed {
                return Err(FetchError::RobotsDisallowed {
                    url: url.to_string(),
                });
            }
            if let Some(delay) = verdict.crawl_delay {
                if delay > min_interval {
                    debug!(url = %url, delay_s = delay.as_secs_f64(), "robots crawl-delay wins");
                    min_interval = delay;
                }
            }
        }

        self.rate_limiter.acquire(&domain, min_interval).await;

        let jitter = Duration::from_millis(rand::thread_rng().gen_range(100..=500));
        tokio::time::sleep(jitter).await;

        let headers = self.build_headers(options.method, &options.headers);
        debug!(url = %url, method = ?options.method, "fetching");

        let mut request = match options.method {
            HttpMethod::Get => self.client.get(parsed.clone()),
            HttpMethod::Post => {
                let builder = self.client.post(parsed.clone());
                match &options.form {
                    Some(form) => builder.form(form),
                    None => builder,
                }
            }
        };
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                warn!(url = %url, error = %e, "HTTP request failed");
                FetchError::Http(Box::new(e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        if !is_textual(&content_type) {
            warn!(url = %url, content_type = %content_type, "non-text response");
            return Err(FetchError::Unreadable {
                url: url.to_string(),
            });
        }

        let charset = charset_from_content_type(&content_type);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        match decode_body(&bytes, charset.as_deref()) {
            Some(body) => {
                debug!(url = %url, chars = body.len(), "fetched");
                Ok(body)
            }
            None => Err(FetchError::Unreadable {
                url: url.to_string(),
            }),
        }
    }
}

fn is_textual(content_type: &str) -> bool {
    // An absent header is treated as textual; servers that omit it
    // usually serve HTML.
    content_type.is_empty()
        || ["html", "text", "xml", "json"]
            .iter()
            .any(|t| content_type.contains(t))
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("charset="))
        .map(|cs| cs.trim_matches('"').to_string())
        .next()
}
