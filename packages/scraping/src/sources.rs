//! Source registry: named upstream configurations loaded from YAML.
//!
//! A source pairs a search endpoint (HTML page or API) with the selector
//! recipe used to extract articles from it. Configs are loaded once at
//! startup and are immutable afterwards.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::fetch::HttpMethod;

fn default_enabled() -> bool {
    true
}

fn default_rate_limit() -> f64 {
    1.0
}

/// Configuration for one upstream source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Display name, also the lookup key
    pub name: String,

    /// Site root, http(s) only
    pub base_url: String,

    /// Disabled sources are loaded but skipped by the pipeline
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Use the API discovery backend instead of HTML scraping
    #[serde(default)]
    pub api_based: bool,

    /// Search URL with a `{query}` placeholder
    #[serde(default)]
    pub search_url_template: Option<String>,

    /// Minimum seconds between requests to this source's domain
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    /// GET or POST for the search request
    #[serde(default)]
    pub request_method: HttpMethod,

    /// Form payload for POST searches; values may embed `{query}`
    #[serde(default)]
    pub request_data: Option<HashMap<String, String>>,

    /// Cap on URLs taken from the search results (overrides global)
    #[serde(default)]
    pub max_search_results: Option<usize>,

    /// Cap on articles actually scraped and processed (overrides global)
    #[serde(default)]
    pub max_articles_to_process: Option<usize>,

    /// Field -> CSS selector; values may be comma-separated fallback lists.
    /// Expected keys: article_links, title, content, date, author.
    #[serde(default)]
    pub selectors: HashMap<String, String>,

    /// Extra headers sent with requests to this source
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl SourceConfig {
    /// Whether the entry has the fields every source must carry.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && (self.base_url.starts_with("http://") || self.base_url.starts_with("https://"))
    }
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

/// Ordered collection of source configurations.
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
    by_name: HashMap<String, usize>,
}

impl SourceRegistry {
    /// Build a registry from already-parsed configs, dropping invalid
    /// entries (missing name, missing or non-http(s) base URL).
    pub fn from_sources(sources: Vec<SourceConfig>) -> Self {
        let mut kept = Vec::with_capacity(sources.len());
        for source in sources {
            if !source.is_valid() {
                warn!(name = %source.name, base_url = %source.base_url, "rejecting invalid source");
                continue;
            }
            debug!(name = %source.name, enabled = source.enabled, "loaded source");
            kept.push(source);
        }

        let by_name = kept
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        Self { sources: kept, by_name }
    }

    /// Parse a registry from YAML text with a top-level `sources:` list.
    pub fn from_yaml(yaml: &str) -> RegistryResult<Self> {
        let file: SourcesFile = serde_yaml::from_str(yaml)?;
        let registry = Self::from_sources(file.sources);
        info!(count = registry.total_count(), "loaded sources");
        Ok(registry)
    }

    /// Load the registry from a YAML file on disk.
    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RegistryError::NotFound {
                path: path.display().to_string(),
            });
        }
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// All sources in file order, optionally only the enabled ones.
    pub fn list(&self, enabled_only: bool) -> Vec<&SourceConfig> {
        self.sources
            .iter()
            .filter(|s| !enabled_only || s.enabled)
            .collect()
    }

    /// Look up one source by name.
    pub fn by_name(&self, name: &str) -> Option<&SourceConfig> {
        self.by_name.get(name).map(|&i| &self.sources[i])
    }

    /// Number of enabled sources.
    pub fn enabled_count(&self) -> usize {
        self.sources.iter().filter(|s| s.enabled).count()
    }

    /// Total number of loaded sources.
    pub fn total_count(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
sources:
  - name: DuckDuckGo
    base_url: https://html.duckduckgo.com
    enabled: true
    search_url_template: "https://html.duckduckgo.com/html/"
    rate_limit: 2.0
    request_method: POST
    request_data:
      q: "{query}"
    selectors:
      article_links: "a.result__a"
      title: "h1, .article-title"
      content: "article, .article-body"
      date: "time"
      author: ".byline"
  - name: Google
    base_url: https://www.googleapis.com
    api_based: true
    max_search_results: 20
    max_articles_to_process: 5
  - name: Broken
    base_url: "ftp://nope.example"
  - name: Disabled
    base_url: https://example.com
    enabled: false
"#;

    #[test]
    fn test_load_and_validate() {
        let registry = SourceRegistry::from_yaml(SAMPLE).unwrap();

        // "Broken" has a non-http(s) base URL and is rejected.
        assert_eq!(registry.total_count(), 3);
        assert_eq!(registry.enabled_count(), 2);
        assert!(registry.by_name("Broken").is_none());
    }

    #[test]
    fn test_list_enabled_preserves_order() {
        let registry = SourceRegistry::from_yaml(SAMPLE).unwrap();
        let enabled = registry.list(true);
        let names: Vec<_> = enabled.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["DuckDuckGo", "Google"]);
    }

    #[test]
    fn test_source_fields() {
        let registry = SourceRegistry::from_yaml(SAMPLE).unwrap();

        let ddg = registry.by_name("DuckDuckGo").unwrap();
        assert_eq!(ddg.request_method, HttpMethod::Post);
        assert_eq!(ddg.rate_limit, 2.0);
        assert_eq!(
            ddg.request_data.as_ref().unwrap().get("q").map(String::as_str),
            Some("{query}")
        );
        assert_eq!(ddg.selectors.get("article_links").map(String::as_str), Some("a.result__a"));

        let google = registry.by_name("Google").unwrap();
        assert!(google.api_based);
        assert_eq!(google.max_search_results, Some(20));
        assert_eq!(google.max_articles_to_process, Some(5));
        // Defaults applied.
        assert!(google.enabled);
        assert_eq!(google.rate_limit, 1.0);
        assert_eq!(google.request_method, HttpMethod::Get);
    }

    #[test]
    fn test_empty_file() {
        let registry = SourceRegistry::from_yaml("sources: []").unwrap();
        assert_eq!(registry.total_count(), 0);
        assert!(registry.list(true).is_empty());
    }

    #[test]
    fn test_missing_file() {
        let result = SourceRegistry::load("/nonexistent/sources.yaml");
        assert!(matches!(result, Err(RegistryError::NotFound { .. })));
    }
}
