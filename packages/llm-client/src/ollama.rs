//! Ollama client for local model inference.
//!
//! Ollama has no prompt cache, so system and user prompts are merged
//! into a single prompt. Token accounting is limited to what the
//! endpoint reports.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};
use crate::types::{GenerationRequest, UsageBreakdown};

/// Default model when none is requested.
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:3b";

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

/// Client for a local Ollama server.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    default_model: String,
}

impl OllamaClient {
    /// Create a client for the given base URL (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            default_model: default_model.into(),
        }
    }

    /// The model used when the request does not name one.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Probe the server; false when it is unreachable.
    pub async fn is_reachable(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Ollama not reachable");
                false
            }
        }
    }

    /// Generate a completion. Ollama uses `num_predict` for the token cap.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> LlmResult<(String, UsageBreakdown)> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let prompt = request.merged_prompt();

        let body = GenerateBody {
            model,
            prompt: &prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        };

        debug!(model = %model, "Ollama request");

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Ollama error");
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        if parsed.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        // No pricing for local inference; token counts only.
        let usage = UsageBreakdown {
            input_tokens: parsed.prompt_eval_count,
            cached_tokens: 0,
            output_tokens: parsed.eval_count,
            total_tokens: parsed.prompt_eval_count + parsed.eval_count,
            total_cost: 0.0,
            cache_hit_rate: 0.0,
        };

        Ok((parsed.response, usage))
    }
}
