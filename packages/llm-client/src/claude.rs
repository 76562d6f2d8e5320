//! Claude API client with prompt caching, retry logic, and cost tracking.
//!
//! The system prompt, when present, is sent as a separate system block
//! marked `cache_control: ephemeral` so identical instructions across a
//! batch of articles are served from the provider's prompt cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::error::{LlmError, LlmResult};
use crate::types::{
    GenerationRequest, ModelInfo, ModelPricing, UsageBreakdown, UsageStats, UsageSummary,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model when none is requested.
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";

fn default_pricing() -> HashMap<String, ModelPricing> {
    let mut table = HashMap::new();
    table.insert(
        "claude-3-5-haiku-20241022".to_string(),
        ModelPricing {
            input: 0.80,
            cached_input: 0.08,
            output: 4.00,
        },
    );
    table.insert(
        "claude-3-haiku-20240307".to_string(),
        ModelPricing {
            input: 0.25,
            cached_input: 0.025,
            output: 1.25,
        },
    );
    table.insert(
        "claude-3-5-sonnet-20241022".to_string(),
        ModelPricing {
            input: 3.00,
            cached_input: 0.30,
            output: 15.00,
        },
    );
    table.insert(
        "claude-3-opus-20240229".to_string(),
        ModelPricing {
            input: 15.00,
            cached_input: 1.50,
            output: 75.00,
        },
    );
    table
}

#[derive(Serialize)]
struct SystemBlock<'a> {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: &'a str,
    cache_control: CacheControl,
}

#[derive(Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    control_type: &'static str,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<SystemBlock<'a>>>,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: ApiUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

/// Claude messages-API client.
///
/// Concurrency is bounded by an internal semaphore independent of the
/// pipeline's worker count, so parallel extraction cannot overrun the
/// provider quota.
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
    max_retries: u32,
    semaphore: Semaphore,
    stats: Mutex<UsageStats>,
}

impl ClaudeClient {
    /// Create a client. `api_key = None` produces an unavailable client
    /// that fails fast with `NotConfigured`.
    pub fn new(api_key: Option<String>) -> Self {
        let pricing = default_pricing();
        let default_row = pricing[DEFAULT_CLAUDE_MODEL];
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key,
            base_url: ANTHROPIC_API_URL.to_string(),
            default_model: DEFAULT_CLAUDE_MODEL.to_string(),
            max_retries: 3,
            semaphore: Semaphore::new(5),
            stats: Mutex::new(UsageStats::new(pricing, default_row)),
        }
    }

    /// Override the API base URL (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Bound concurrent in-flight requests.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.semaphore = Semaphore::new(max_concurrent.max(1));
        self
    }

    /// Replace the price table.
    pub fn with_pricing(mut self, pricing: HashMap<String, ModelPricing>) -> Self {
        let default_row = pricing
            .get(DEFAULT_CLAUDE_MODEL)
            .copied()
            .unwrap_or(ModelPricing {
                input: 0.80,
                cached_input: 0.08,
                output: 4.00,
            });
        self.stats = Mutex::new(UsageStats::new(pricing, default_row));
        self
    }

    /// Whether credentials are configured.
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// The model used when the request does not name one.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn headers(&self, api_key: &str) -> LlmResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| LlmError::Auth("invalid API key".into()))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Generate a completion, retrying on rate limits with exponential
    /// backoff (2·2ⁿ seconds, at most `max_retries` attempts) and failing
    /// fast on authentication errors.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> LlmResult<(String, UsageBreakdown)> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::NotConfigured("Claude API key not set".into()))?;

        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let url = format!("{}/messages", self.base_url);

        let system = request
            .system_prompt
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|text| {
                vec![SystemBlock {
                    block_type: "text",
                    text,
                    cache_control: CacheControl {
                        control_type: "ephemeral",
                    },
                }]
            });

        let body = MessagesRequest {
            model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system,
            messages: vec![UserMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let _permit = self.semaphore.acquire().await.expect("semaphore open");

        for attempt in 0..self.max_retries {
            debug!(model = %model, attempt, "Claude request");

            let response = match self
                .http
                .post(&url)
                .headers(self.headers(api_key)?)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    // Timeouts and connection failures get the same
                    // sleep-and-retry treatment as bad status codes.
                    warn!(attempt = attempt + 1, error = %e, "Claude request failed");
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                    return Err(LlmError::Http(e));
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                let wait = Duration::from_secs(2u64 << attempt);
                warn!(
                    attempt = attempt + 1,
                    wait_s = wait.as_secs(),
                    "Claude rate limit, backing off"
                );
                if attempt + 1 < self.max_retries {
                    tokio::time::sleep(wait).await;
                    continue;
                }
                return Err(LlmError::RateLimited {
                    attempts: self.max_retries,
                });
            }

            if status.as_u16() == 401 || status.as_u16() == 403 {
                let message = response.text().await.unwrap_or_default();
                error!(status = status.as_u16(), "Claude authentication error");
                return Err(LlmError::Auth(message));
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), "Claude API error");
                if attempt + 1 < self.max_retries {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
                return Err(LlmError::Provider {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: MessagesResponse = response.json().await?;
            let text = parsed
                .content
                .first()
                .map(|block| block.text.clone())
                .filter(|t| !t.is_empty())
                .ok_or(LlmError::EmptyResponse)?;

            let breakdown = self.stats.lock().unwrap().record(
                model,
                parsed.usage.input_tokens,
                parsed.usage.cache_read_input_tokens,
                parsed.usage.output_tokens,
            );

            info!(
                model = %model,
                tokens = breakdown.total_tokens,
                cost = breakdown.total_cost,
                cache_hit_rate = breakdown.cache_hit_rate,
                "Claude response"
            );

            return Ok((text, breakdown));
        }

        Err(LlmError::RateLimited {
            attempts: self.max_retries,
        })
    }

    /// Usage totals since the last reset.
    pub fn usage_stats(&self) -> UsageSummary {
        self.stats.lock().unwrap().summary()
    }

    /// Zero the usage counters.
    pub fn reset_stats(&self) {
        self.stats.lock().unwrap().reset();
    }

    /// Models this client knows pricing and metadata for.
    pub fn list_models() -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-3-5-haiku-20241022".to_string(),
                name: "Claude 3.5 Haiku".to_string(),
                description: "Fastest and most cost-effective".to_string(),
            },
            ModelInfo {
                id: "claude-3-haiku-20240307".to_string(),
                name: "Claude 3 Haiku".to_string(),
                description: "Fast and affordable".to_string(),
            },
            ModelInfo {
                id: "claude-3-5-sonnet-20241022".to_string(),
                name: "Claude 3.5 Sonnet".to_string(),
                description: "Balanced quality and speed".to_string(),
            },
            ModelInfo {
                id: "claude-3-opus-20240229".to_string(),
                name: "Claude 3 Opus".to_string(),
                description: "Highest quality, most expensive".to_string(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_client_is_unavailable() {
        let client = ClaudeClient::new(None);
        assert!(!client.is_available());
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_fast() {
        let client = ClaudeClient::new(None);
        let request = GenerationRequest::new("hello");
        let result = client.generate(&request).await;
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_request_serialisation_includes_cache_control() {
        let body = MessagesRequest {
            model: "claude-3-5-haiku-20241022",
            max_tokens: 100,
            temperature: 0.2,
            system: Some(vec![SystemBlock {
                block_type: "text",
                text: "You are precise.",
                cache_control: CacheControl {
                    control_type: "ephemeral",
                },
            }]),
            messages: vec![UserMessage {
                role: "user",
                content: "hi",
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"][0]["cache_control"]["type"], "ephemeral");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_request_without_system_omits_field() {
        let body = MessagesRequest {
            model: "m",
            max_tokens: 1,
            temperature: 0.0,
            system: None,
            messages: vec![UserMessage {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_usage_stats_start_empty() {
        let client = ClaudeClient::new(Some("key".into()));
        let summary = client.usage_stats();
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.total_cost, 0.0);
    }
}
