//! Per-thread/per-run LLM configuration (§3 data model): which wire protocol,
//! which model, and the [`AdapterConfig`] a `custom` provider needs. [`build_provider`]
//! is the one place that turns this declarative value into a live [`Provider`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{AdapterConfig, AnthropicProvider, CustomHttpProvider, GeminiProvider, OpenAiProvider, Provider};

/// Which wire protocol a [`LlmConfig`] targets.
///
/// Mirrors `AdapterConfig.protocol` in §6's persisted shape; `Custom` is the
/// only variant that requires `LlmConfig.adapter` to be `Some`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Openai,
    Anthropic,
    Gemini,
    Custom,
}

/// `{provider, model, apiKey, baseUrl?, timeout?, maxTokens?, temperature?, topP?,
/// contextLimit, adapter}` from §3. Not a secret store itself: `api_key` is expected
/// to already be resolved (e.g. from an env var) by the time this is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Total request timeout in seconds; provider streaming still applies its own
    /// first-byte/total two-timeout scheme (§4.3) on top of this.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    /// Authoritative context window for this model (§4.9's compaction ratio math
    /// divides by this, never by a guess derived from `model`'s name).
    pub context_limit: u32,
    /// Required when `provider == Custom`; ignored otherwise.
    #[serde(default)]
    pub adapter: Option<AdapterConfig>,
}

impl LlmConfig {
    pub fn new(provider: ProviderKind, model: impl Into<String>, context_limit: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: String::new(),
            base_url: None,
            timeout_secs: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            context_limit,
            adapter: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_adapter(mut self, adapter: AdapterConfig) -> Self {
        self.adapter = Some(adapter);
        self
    }
}

/// Error building a [`Provider`] from an [`LlmConfig`].
#[derive(Debug, thiserror::Error)]
pub enum LlmConfigError {
    #[error("provider 'custom' requires LlmConfig.adapter to be set")]
    MissingAdapter,
}

/// Instantiates the concrete [`Provider`] an [`LlmConfig`] describes.
///
/// This is the only place protocol selection happens; callers (the CLI, a host
/// embedding the core) never match on `ProviderKind` themselves.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn Provider>, LlmConfigError> {
    let provider: Arc<dyn Provider> = match config.provider {
        ProviderKind::Openai => {
            let mut openai_config = async_openai::config::OpenAIConfig::new().with_api_key(&config.api_key);
            if let Some(base_url) = &config.base_url {
                openai_config = openai_config.with_api_base(base_url);
            }
            Arc::new(OpenAiProvider::with_config(openai_config))
        }
        ProviderKind::Anthropic => {
            let mut provider = AnthropicProvider::new(&config.api_key);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
        ProviderKind::Gemini => {
            let mut provider = GeminiProvider::new(&config.api_key);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
        ProviderKind::Custom => {
            let adapter = config.adapter.clone().ok_or(LlmConfigError::MissingAdapter)?;
            Arc::new(CustomHttpProvider::new(adapter, config.api_key.clone()))
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_openai_provider_from_config() {
        let config = LlmConfig::new(ProviderKind::Openai, "gpt-4o-mini", 128_000).with_api_key("sk-test");
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn custom_without_adapter_is_an_error() {
        let config = LlmConfig::new(ProviderKind::Custom, "some-model", 32_000);
        let err = build_provider(&config).unwrap_err();
        assert!(matches!(err, LlmConfigError::MissingAdapter));
    }
}
