//! Routing between providers with automatic fallback.
//!
//! Primary and secondary providers are interchangeable behind one call
//! interface. The only provider-specific nuance callers may rely on is
//! prompt caching: Claude receives the system prompt as a cache-eligible
//! block, Ollama receives a merged single prompt.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::claude::ClaudeClient;
use crate::error::{LlmError, LlmResult};
use crate::ollama::OllamaClient;
use crate::types::{GenerationMeta, GenerationRequest, ModelInfo, UsageSummary};

/// Selectable LLM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    Ollama,
}

impl Provider {
    /// The other provider, used for fallback.
    pub fn other(self) -> Self {
        match self {
            Self::Claude => Self::Ollama,
            Self::Ollama => Self::Claude,
        }
    }

    /// Wire name of the provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Ollama => "ollama",
        }
    }
}

impl FromStr for Provider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability report for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub available: bool,
    pub model: String,
}

/// Status of the router and both providers.
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatus {
    pub default_provider: Provider,
    pub fallback_enabled: bool,
    pub claude: ProviderStatus,
    pub ollama: ProviderStatus,
}

/// One call interface over multiple LLM providers.
pub struct LlmRouter {
    claude: ClaudeClient,
    ollama: OllamaClient,
    default_provider: Provider,
    enable_fallback: bool,
    /// A provider that fails authentication is skipped until reset.
    claude_unhealthy: AtomicBool,
    ollama_unhealthy: AtomicBool,
}

impl LlmRouter {
    /// Create a router. The default provider handles requests that do not
    /// name one.
    pub fn new(
        claude: ClaudeClient,
        ollama: OllamaClient,
        default_provider: Provider,
        enable_fallback: bool,
    ) -> Self {
        Self {
            claude,
            ollama,
            default_provider,
            enable_fallback,
            claude_unhealthy: AtomicBool::new(false),
            ollama_unhealthy: AtomicBool::new(false),
        }
    }

    /// The configured default provider.
    pub fn default_provider(&self) -> Provider {
        self.default_provider
    }

    fn unhealthy_flag(&self, provider: Provider) -> &AtomicBool {
        match provider {
            Provider::Claude => &self.claude_unhealthy,
            Provider::Ollama => &self.ollama_unhealthy,
        }
    }

    /// Whether a provider has been marked unhealthy.
    pub fn is_unhealthy(&self, provider: Provider) -> bool {
        self.unhealthy_flag(provider).load(Ordering::SeqCst)
    }

    /// Clear unhealthy marks (e.g. after rotating credentials).
    pub fn reset_health(&self) {
        self.claude_unhealthy.store(false, Ordering::SeqCst);
        self.ollama_unhealthy.store(false, Ordering::SeqCst);
    }

    /// Auth failures are not transient: mark the provider so subsequent
    /// requests in this run skip it instead of re-failing.
    fn note_failure(&self, provider: Provider, error: &LlmError) {
        if matches!(error, LlmError::Auth(_)) {
            error!(provider = %provider, "marking provider unhealthy after auth failure");
            self.unhealthy_flag(provider).store(true, Ordering::SeqCst);
        }
    }

    async fn generate_with(
        &self,
        provider: Provider,
        request: &GenerationRequest,
    ) -> LlmResult<(String, GenerationMeta)> {
        match provider {
            Provider::Claude => {
                let (text, usage) = self.claude.generate(request).await?;
                let model = request
                    .model
                    .clone()
                    .unwrap_or_else(|| self.claude.default_model().to_string());
                Ok((
                    text,
                    GenerationMeta {
                        provider: provider.as_str().to_string(),
                        model,
                        usage: Some(usage),
                        fallback_used: false,
                    },
                ))
            }
            Provider::Ollama => {
                let (text, usage) = self.ollama.generate(request).await?;
                let model = request
                    .model
                    .clone()
                    .unwrap_or_else(|| self.ollama.default_model().to_string());
                Ok((
                    text,
                    GenerationMeta {
                        provider: provider.as_str().to_string(),
                        model,
                        usage: Some(usage),
                        fallback_used: false,
                    },
                ))
            }
        }
    }

    /// Generate text with the chosen (or default) provider, falling back
    /// to the other provider once, with its default model, when the
    /// primary fails and fallback is enabled.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        provider: Option<Provider>,
    ) -> LlmResult<(String, GenerationMeta)> {
        let primary = provider.unwrap_or(self.default_provider);

        let primary_result = if self.is_unhealthy(primary) {
            warn!(provider = %primary, "skipping unhealthy provider");
            Err(LlmError::Auth("provider marked unhealthy".to_string()))
        } else {
            let result = self.generate_with(primary, request).await;
            if let Err(e) = &result {
                self.note_failure(primary, e);
            }
            result
        };

        match primary_result {
            Ok(result) => Ok(result),
            Err(primary_err) => {
                if !self.enable_fallback {
                    return Err(primary_err);
                }

                let secondary = primary.other();
                if self.is_unhealthy(secondary) {
                    warn!(provider = %secondary, "fallback provider also unhealthy");
                    return Err(LlmError::AllProvidersFailed);
                }
                warn!(
                    primary = %primary,
                    fallback = %secondary,
                    error = %primary_err,
                    "primary provider failed, trying fallback"
                );

                // Fallback drops the model override: models are not
                // portable across providers.
                let mut fallback_request = request.clone();
                fallback_request.model = None;

                match self.generate_with(secondary, &fallback_request).await {
                    Ok((text, mut meta)) => {
                        meta.fallback_used = true;
                        Ok((text, meta))
                    }
                    Err(fallback_err) => {
                        self.note_failure(secondary, &fallback_err);
                        error!(
                            primary_error = %primary_err,
                            fallback_error = %fallback_err,
                            "all providers failed"
                        );
                        Err(LlmError::AllProvidersFailed)
                    }
                }
            }
        }
    }

    /// Availability and model info for both providers.
    pub async fn status(&self) -> RouterStatus {
        RouterStatus {
            default_provider: self.default_provider,
            fallback_enabled: self.enable_fallback,
            claude: ProviderStatus {
                available: self.claude.is_available(),
                model: self.claude.default_model().to_string(),
            },
            ollama: ProviderStatus {
                available: self.ollama.is_reachable().await,
                model: self.ollama.default_model().to_string(),
            },
        }
    }

    /// Claude usage totals since the last reset.
    pub fn usage_stats(&self) -> UsageSummary {
        self.claude.usage_stats()
    }

    /// Zero the usage counters.
    pub fn reset_stats(&self) {
        self.claude.reset_stats();
    }

    /// Models known to the Claude client.
    pub fn list_models(&self) -> Vec<ModelInfo> {
        ClaudeClient::list_models()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claude::DEFAULT_CLAUDE_MODEL;
    use crate::ollama::DEFAULT_OLLAMA_MODEL;

    fn router(fallback: bool) -> LlmRouter {
        LlmRouter::new(
            ClaudeClient::new(None),
            OllamaClient::new("http://localhost:1", DEFAULT_OLLAMA_MODEL),
            Provider::Claude,
            fallback,
        )
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("claude".parse::<Provider>(), Ok(Provider::Claude));
        assert_eq!("OLLAMA".parse::<Provider>(), Ok(Provider::Ollama));
        assert!("gpt".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_other() {
        assert_eq!(Provider::Claude.other(), Provider::Ollama);
        assert_eq!(Provider::Ollama.other(), Provider::Claude);
    }

    #[tokio::test]
    async fn test_no_fallback_returns_primary_error() {
        let router = router(false);
        let request = GenerationRequest::new("hello");
        let result = router.generate(&request, None).await;
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_fallback_exhaustion() {
        // Claude unconfigured, Ollama unreachable: both fail.
        let router = router(true);
        let request = GenerationRequest::new("hello");
        let result = router.generate(&request, None).await;
        assert!(matches!(result, Err(LlmError::AllProvidersFailed)));
    }

    #[tokio::test]
    async fn test_health_marks_are_sticky_until_reset() {
        let router = router(false);
        assert!(!router.is_unhealthy(Provider::Claude));

        router.note_failure(Provider::Claude, &LlmError::Auth("bad key".into()));
        assert!(router.is_unhealthy(Provider::Claude));

        // Non-auth errors do not mark a provider.
        router.note_failure(
            Provider::Ollama,
            &LlmError::Provider {
                status: 500,
                message: String::new(),
            },
        );
        assert!(!router.is_unhealthy(Provider::Ollama));

        router.reset_health();
        assert!(!router.is_unhealthy(Provider::Claude));
    }

    #[tokio::test]
    async fn test_status_reports_models() {
        let router = router(true);
        let status = router.status().await;
        assert_eq!(status.claude.model, DEFAULT_CLAUDE_MODEL);
        assert!(!status.claude.available);
        assert_eq!(status.default_provider, Provider::Claude);
    }
}
