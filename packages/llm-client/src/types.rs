//! Request, response, and usage-accounting types shared by providers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single generation request, provider-agnostic.
///
/// When a system prompt is present and the provider supports prompt
/// caching, the system prompt is marked cache-eligible so repeated
/// identical system prompts amortise cost. Providers without caching
/// receive the system and user prompts merged into one.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Stable instructions; cache-eligible on capable providers
    pub system_prompt: Option<String>,

    /// The per-call prompt
    pub prompt: String,

    /// Provider-specific model override
    pub model: Option<String>,

    /// Generation cap
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl GenerationRequest {
    /// Create a request with the library defaults (1024 tokens, 0.2).
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.2,
            ..Self::default()
        }
    }

    /// Attach a cache-eligible system prompt.
    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    /// Override the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// System and user prompts merged, for providers without caching.
    pub fn merged_prompt(&self) -> String {
        match &self.system_prompt {
            Some(system) if !system.is_empty() => format!("{}\n\n{}", system, self.prompt),
            _ => self.prompt.clone(),
        }
    }
}

/// Token and cost breakdown for one call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageBreakdown {
    pub input_tokens: u64,
    pub cached_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    /// Percentage of input tokens served from the prompt cache
    pub cache_hit_rate: f64,
}

/// Metadata returned alongside generated text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMeta {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub usage: Option<UsageBreakdown>,
    /// True when the fallback provider produced this response
    #[serde(default)]
    pub fallback_used: bool,
}

/// Per-model pricing in dollars per million tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub cached_input: f64,
    pub output: f64,
}

/// Aggregated usage across all calls since the last reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_requests: u64,
    pub total_input_tokens: u64,
    pub total_cached_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost: f64,
    pub cache_savings: f64,
    pub average_cost_per_request: f64,
    pub cache_hit_rate: f64,
    pub since: DateTime<Utc>,
}

/// Mutable usage counters, guarded by the owning client.
#[derive(Debug)]
pub struct UsageStats {
    pricing: HashMap<String, ModelPricing>,
    default_pricing: ModelPricing,
    total_input_tokens: u64,
    total_cached_tokens: u64,
    total_output_tokens: u64,
    total_cost: f64,
    request_count: u64,
    last_reset: DateTime<Utc>,
}

impl UsageStats {
    /// Create counters with the given price table and a default row used
    /// for unknown models.
    pub fn new(pricing: HashMap<String, ModelPricing>, default_pricing: ModelPricing) -> Self {
        Self {
            pricing,
            default_pricing,
            total_input_tokens: 0,
            total_cached_tokens: 0,
            total_output_tokens: 0,
            total_cost: 0.0,
            request_count: 0,
            last_reset: Utc::now(),
        }
    }

    /// Record one call's token counts and return its breakdown.
    pub fn record(
        &mut self,
        model: &str,
        input_tokens: u64,
        cached_tokens: u64,
        output_tokens: u64,
    ) -> UsageBreakdown {
        let pricing = self
            .pricing
            .get(model)
            .copied()
            .unwrap_or(self.default_pricing);

        let input_cost = input_tokens as f64 / 1_000_000.0 * pricing.input;
        let cached_cost = cached_tokens as f64 / 1_000_000.0 * pricing.cached_input;
        let output_cost = output_tokens as f64 / 1_000_000.0 * pricing.output;
        let total_cost = input_cost + cached_cost + output_cost;

        self.total_input_tokens += input_tokens;
        self.total_cached_tokens += cached_tokens;
        self.total_output_tokens += output_tokens;
        self.total_cost += total_cost;
        self.request_count += 1;

        let prompt_tokens = input_tokens + cached_tokens;
        let cache_hit_rate = if prompt_tokens > 0 {
            cached_tokens as f64 / prompt_tokens as f64 * 100.0
        } else {
            0.0
        };

        UsageBreakdown {
            input_tokens,
            cached_tokens,
            output_tokens,
            total_tokens: prompt_tokens + output_tokens,
            total_cost,
            cache_hit_rate,
        }
    }

    /// Summarise the counters.
    pub fn summary(&self) -> UsageSummary {
        let prompt_tokens = self.total_input_tokens + self.total_cached_tokens;

        // Savings relative to paying the full input rate for cached tokens.
        let cached = self.total_cached_tokens as f64 / 1_000_000.0;
        let cache_savings =
            cached * (self.default_pricing.input - self.default_pricing.cached_input);

        UsageSummary {
            total_requests: self.request_count,
            total_input_tokens: self.total_input_tokens,
            total_cached_tokens: self.total_cached_tokens,
            total_output_tokens: self.total_output_tokens,
            total_cost: self.total_cost,
            cache_savings,
            average_cost_per_request: if self.request_count > 0 {
                self.total_cost / self.request_count as f64
            } else {
                0.0
            },
            cache_hit_rate: if prompt_tokens > 0 {
                self.total_cached_tokens as f64 / prompt_tokens as f64 * 100.0
            } else {
                0.0
            },
            since: self.last_reset,
        }
    }

    /// Zero all counters.
    pub fn reset(&mut self) {
        self.total_input_tokens = 0;
        self.total_cached_tokens = 0;
        self.total_output_tokens = 0;
        self.total_cost = 0.0;
        self.request_count = 0;
        self.last_reset = Utc::now();
    }
}

/// Descriptive entry for a selectable model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}
