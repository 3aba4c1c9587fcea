use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LLMConfig;
use crate::llm_providers::{
    Completion, CompletionOptions, LLMProvider, LLMProviderFactory, LLMProviderType, LlmError, ProviderSettings,
};

/// Chat-completion access with retry on transient upstream failures
#[derive(Debug, Clone)]
pub struct LLMService {
    provider: LLMProvider,
    options: CompletionOptions,
    max_tries: u32,
    backoff: Duration,
    has_api_key: bool,
}

impl LLMService {
    pub fn new(config: &LLMConfig) -> Self {
        let provider = LLMProviderFactory::create_provider(
            config.provider,
            ProviderSettings {
                api_key: config.api_key.clone(),
                base_url: config.base_url.clone(),
                model: Some(config.model.clone()),
                timeout: Duration::from_millis(config.timeout_ms),
                referer: config.referer.clone(),
                title: config.title.clone(),
            },
        );

        Self {
            provider,
            options: CompletionOptions {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            max_tries: config.max_tries.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
            has_api_key: !config.api_key.is_empty(),
        }
    }

    /// Build a service against an arbitrary OpenAI-compatible base URL
    pub fn with_base_url(api_key: &str, base_url: &str, model: &str) -> Self {
        Self::new(&LLMConfig {
            api_key: api_key.to_string(),
            base_url: Some(base_url.to_string()),
            provider: LLMProviderType::OpenRouter,
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: 512,
            max_tries: 1,
            backoff_ms: 0,
            timeout_ms: 10_000,
            referer: None,
            title: None,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.has_api_key
    }

    /// Get the provider name for logging and testing
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Get the model name being used
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// One completion, retried on rate limits, 5xx and transport errors
    pub async fn complete(&self, system_message: &str, prompt: &str) -> Result<Completion, LlmError> {
        let mut attempt = 1u32;
        loop {
            match self.provider.make_request(Some(system_message), prompt, &self.options).await {
                Ok(completion) => {
                    debug!(
                        provider = self.provider_name(),
                        attempt,
                        response_content = %completion.text,
                        "Raw LLM completion"
                    );
                    return Ok(completion);
                }
                Err(e) if e.is_retryable() && attempt < self.max_tries => {
                    warn!(
                        provider = self.provider_name(),
                        attempt,
                        max_tries = self.max_tries,
                        error = %e,
                        "LLM request failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
