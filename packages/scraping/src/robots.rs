//! robots.txt parsing and the per-host fetch gate.
//!
//! The gate caches one parsed robots.txt per host (1 h TTL). A failed
//! fetch caches a permissive result so a broken robots endpoint cannot
//! stall the whole scraper.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use url::Url;

/// Default time to keep a parsed robots.txt per host.
const ROBOTS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Parsed robots.txt rules.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    /// Rules per user-agent token (lowercase)
    rules: HashMap<String, AgentRules>,

    /// Rules for the wildcard agent (*)
    default_rules: AgentRules,
}

/// Rules for a single user-agent group.
#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
    crawl_delay: Option<f64>,
}

impl RobotsTxt {
    /// Parse robots.txt content.
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules = AgentRules::default();
        let mut in_rule_block = false;

        let flush = |agents: &mut Vec<String>, rules: &mut AgentRules, robots: &mut Self| {
            for agent in agents.drain(..) {
                if agent == "*" {
                    robots.default_rules = rules.clone();
                } else {
                    robots.rules.insert(agent, rules.clone());
                }
            }
            *rules = AgentRules::default();
        };

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group.
                    if in_rule_block {
                        flush(&mut current_agents, &mut current_rules, &mut robots);
                        in_rule_block = false;
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    in_rule_block = true;
                    if !value.is_empty() {
                        current_rules.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    in_rule_block = true;
                    if !value.is_empty() {
                        current_rules.allow.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    in_rule_block = true;
                    if let Ok(delay) = value.parse::<f64>() {
                        current_rules.crawl_delay = Some(delay);
                    }
                }
                _ => {}
            }
        }

        flush(&mut current_agents, &mut current_rules, &mut robots);
        robots
    }

    fn rules_for(&self, user_agent: &str) -> &AgentRules {
        let agent_lower = user_agent.to_lowercase();
        self.rules
            .get(&agent_lower)
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|(token, _)| agent_lower.contains(token.as_str()))
                    .map(|(_, rules)| rules)
            })
            .unwrap_or(&self.default_rules)
    }

    /// Check whether `path` may be fetched by `user_agent`.
    ///
    /// Allow rules take precedence over disallow rules.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let rules = self.rules_for(user_agent);

        for allow in &rules.allow {
            if path.starts_with(allow.as_str()) {
                return true;
            }
        }

        for disallow in &rules.disallow {
            if disallow == "/" || path.starts_with(disallow.as_str()) {
                return false;
            }
        }

        true
    }

    /// Crawl delay for `user_agent`, if the file specifies one.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.rules_for(user_agent)
            .crawl_delay
            .or(self.default_rules.crawl_delay)
            .map(Duration::from_secs_f64)
    }
}

/// Result of a gate check for one URL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotsVerdict {
    /// Whether the URL may be fetched
    pub allowed: bool,

    /// Crawl delay requested by the host, if any
    pub crawl_delay: Option<Duration>,
}

impl RobotsVerdict {
    fn permissive() -> Self {
        Self {
            allowed: true,
            crawl_delay: None,
        }
    }
}

struct CachedRobots {
    robots: RobotsTxt,
    fetched_at: Instant,
}

/// Cached per-host robots.txt gate.
pub struct RobotsGate {
    client: reqwest::Client,
    user_agent: String,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsGate {
    /// Create a gate that checks permissions for the given user agent.
    pub fn new(client: reqwest::Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            ttl: ROBOTS_CACHE_TTL,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Override the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Check whether `url` may be fetched, returning the verdict together
    /// with any crawl delay the host requests.
    ///
    /// When the crawl delay exceeds the source's configured interval the
    /// gate's value wins; that comparison is the fetcher's job.
    pub async fn can_fetch(&self, url: &str) -> RobotsVerdict {
        let Ok(parsed) = Url::parse(url) else {
            return RobotsVerdict::permissive();
        };
        let Some(host) = parsed.host_str() else {
            return RobotsVerdict::permissive();
        };
        let host = host.to_string();

        let robots = match self.cached(&host) {
            Some(robots) => robots,
            None => self.fetch_and_cache(&parsed, &host).await,
        };

        let allowed = robots.is_allowed(&self.user_agent, parsed.path());
        if !allowed {
            debug!(url = %url, "robots.txt disallows fetch");
        }

        RobotsVerdict {
            allowed,
            crawl_delay: robots.crawl_delay(&self.user_agent),
        }
    }

    fn cached(&self, host: &str) -> Option<RobotsTxt> {
        let cache = self.cache.lock().unwrap();
        cache
            .get(host)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.robots.clone())
    }

    async fn fetch_and_cache(&self, url: &Url, host: &str) -> RobotsTxt {
        let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);

        let robots = match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => RobotsTxt::parse(&body),
                Err(e) => {
                    warn!(url = %robots_url, error = %e, "failed to read robots.txt body");
                    RobotsTxt::default()
                }
            },
            Ok(response) => {
                debug!(url = %robots_url, status = %response.status(), "no usable robots.txt");
                RobotsTxt::default()
            }
            Err(e) => {
                // Cache the permissive default so one broken endpoint
                // is not re-fetched for every URL on the host.
                warn!(url = %robots_url, error = %e, "could not fetch robots.txt, allowing");
                RobotsTxt::default()
            }
        };

        self.cache.lock().unwrap().insert(
            host.to_string(),
            CachedRobots {
                robots: robots.clone(),
                fetched_at: Instant::now(),
            },
        );

        robots
    }

    /// Drop the cached robots.txt for one host, or all hosts.
    pub fn clear_cache(&self, host: Option<&str>) {
        let mut cache = self.cache.lock().unwrap();
        match host {
            Some(host) => {
                cache.remove(host);
            }
            None => cache.clear(),
        }
    }

    /// Number of hosts currently cached.
    pub fn cached_hosts(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let content = r#"
User-agent: *
Disallow: /private/
Disallow: /admin/
Allow: /public/
Crawl-delay: 2
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(robots.is_allowed("TestBot", "/public/page"));
        assert!(!robots.is_allowed("TestBot", "/private/page"));
        assert!(!robots.is_allowed("TestBot", "/admin/"));
        assert!(robots.is_allowed("TestBot", "/other/page"));
        assert_eq!(robots.crawl_delay("TestBot"), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_specific_user_agent_overrides_wildcard() {
        let content = r#"
User-agent: *
Disallow: /

User-agent: goodbot
Allow: /
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("BadBot", "/page"));
        assert!(robots.is_allowed("GoodBot", "/page"));
    }

    #[test]
    fn test_allow_takes_precedence() {
        let content = r#"
User-agent: *
Disallow: /private/
Allow: /private/public/
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("Bot", "/private/secret"));
        assert!(robots.is_allowed("Bot", "/private/public/page"));
    }

    #[test]
    fn test_empty_robots_allows_everything() {
        let robots = RobotsTxt::parse("");
        assert!(robots.is_allowed("AnyBot", "/any/path"));
        assert!(robots.crawl_delay("AnyBot").is_none());
    }

    #[test]
    fn test_comments_ignored() {
        let content = r#"
# full-line comment
User-agent: *   # trailing comment
Disallow: /hidden/
        "#;

        let robots = RobotsTxt::parse(content);
        assert!(!robots.is_allowed("Bot", "/hidden/x"));
        assert!(robots.is_allowed("Bot", "/visible"));
    }

    #[test]
    fn test_multiple_agents_share_group() {
        let content = r#"
User-agent: alpha
User-agent: beta
Disallow: /x/
        "#;

        let robots = RobotsTxt::parse(content);
        assert!(!robots.is_allowed("alpha", "/x/1"));
        assert!(!robots.is_allowed("beta", "/x/1"));
        assert!(robots.is_allowed("gamma", "/x/1"));
    }
}
