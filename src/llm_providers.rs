use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::config::{DEFAULT_MODEL, DEFAULT_OPENROUTER_BASE_URL};
use crate::log_upstream;

/// Common message structure for LLM requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: String,
    pub content: String,
}

/// Sampling options sent with every completion request
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A finished chat completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub finish_reason: Option<String>,
    pub model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{provider} API request failed with status {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to parse {provider} response JSON: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },

    #[error("Network error calling {provider}: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    #[error("No choices in {provider} response")]
    EmptyChoices { provider: &'static str },
}

impl LlmError {
    /// Rate limits, upstream 5xx and transport failures are worth another try
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http { status, .. } => *status == 429 || *status >= 500,
            LlmError::Network { .. } => true,
            LlmError::Parse { .. } | LlmError::EmptyChoices { .. } => false,
        }
    }
}

/// Enum-based LLM provider; both variants speak the OpenAI chat-completions dialect
#[derive(Debug, Clone)]
pub enum LLMProvider {
    OpenRouter(ChatCompletionsProvider),
    OpenAI(ChatCompletionsProvider),
}

impl LLMProvider {
    pub async fn make_request(
        &self,
        system_message: Option<&str>,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        match self {
            LLMProvider::OpenRouter(provider) | LLMProvider::OpenAI(provider) => {
                provider.make_request(system_message, prompt, options).await
            }
        }
    }

    /// Get the provider name for logging
    pub fn provider_name(&self) -> &'static str {
        match self {
            LLMProvider::OpenRouter(provider) | LLMProvider::OpenAI(provider) => provider.provider_name(),
        }
    }

    /// Get the model name being used
    pub fn model_name(&self) -> &str {
        match self {
            LLMProvider::OpenRouter(provider) | LLMProvider::OpenAI(provider) => provider.model_name(),
        }
    }
}

/// OpenAI-compatible `/chat/completions` client
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    client: Client,
    name: &'static str,
    api_key: String,
    base_url: String,
    model: String,
    extra_headers: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<LLMMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsProvider {
    pub fn new(
        name: &'static str,
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
        extra_headers: Vec<(&'static str, String)>,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            name,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            extra_headers,
        }
    }

    pub async fn make_request(
        &self,
        system_message: Option<&str>,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            messages.push(LLMMessage {
                role: "system".to_string(),
                content: sys_msg.to_string(),
            });
        }

        messages.push(LLMMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request_body = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);

        info!(
            provider = self.name,
            model = %self.model,
            base_url = %self.base_url,
            prompt_length = prompt.len(),
            "Making LLM request"
        );
        let started = Instant::now();

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body);
        for (name, value) in &self.extra_headers {
            request = request.header(*name, value);
        }

        let response = request.send().await.map_err(|e| LlmError::Network {
            provider: self.name,
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                provider = self.name,
                status = %status,
                error = %error_text,
                "LLM API request failed"
            );
            return Err(LlmError::Http {
                provider: self.name,
                status: status.as_u16(),
                body: error_text,
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| LlmError::Parse {
            provider: self.name,
            message: e.to_string(),
        })?;

        let Some(choice) = chat_response.choices.into_iter().next() else {
            return Err(LlmError::EmptyChoices { provider: self.name });
        };

        let text = choice
            .message
            .and_then(|m| m.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        log_upstream!(
            success,
            self.name,
            endpoint = url,
            duration_ms = started.elapsed().as_millis() as u64
        );
        info!(
            provider = self.name,
            response_length = text.len(),
            finish_reason = ?choice.finish_reason,
            "Successfully received LLM response"
        );

        Ok(Completion {
            text,
            finish_reason: choice.finish_reason,
            model: chat_response.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    pub fn provider_name(&self) -> &'static str {
        self.name
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory for creating LLM providers based on provider type
pub struct LLMProviderFactory;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum LLMProviderType {
    OpenRouter,
    OpenAI,
}

/// Everything needed to build a provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout: Duration,
    pub referer: Option<String>,
    pub title: Option<String>,
}

impl LLMProviderFactory {
    pub fn create_provider(provider_type: LLMProviderType, settings: ProviderSettings) -> LLMProvider {
        let model = settings.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        match provider_type {
            LLMProviderType::OpenRouter => {
                let mut headers = Vec::new();
                if let Some(referer) = settings.referer {
                    headers.push(("HTTP-Referer", referer));
                }
                if let Some(title) = settings.title {
                    headers.push(("X-Title", title));
                }
                LLMProvider::OpenRouter(ChatCompletionsProvider::new(
                    "OpenRouter",
                    settings.api_key,
                    settings
                        .base_url
                        .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
                    model,
                    settings.timeout,
                    headers,
                ))
            }
            LLMProviderType::OpenAI => LLMProvider::OpenAI(ChatCompletionsProvider::new(
                "OpenAI",
                settings.api_key,
                settings
                    .base_url
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                model.trim_start_matches("openai/").to_string(),
                settings.timeout,
                Vec::new(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProviderSettings {
        ProviderSettings {
            api_key: "sk-test".to_string(),
            base_url: None,
            model: None,
            timeout: Duration::from_secs(5),
            referer: Some("https://example.test".to_string()),
            title: Some("answer-site".to_string()),
        }
    }

    #[test]
    fn test_factory_defaults() {
        let provider = LLMProviderFactory::create_provider(LLMProviderType::OpenRouter, settings());
        assert_eq!(provider.provider_name(), "OpenRouter");
        assert_eq!(provider.model_name(), DEFAULT_MODEL);

        let provider = LLMProviderFactory::create_provider(LLMProviderType::OpenAI, settings());
        assert_eq!(provider.provider_name(), "OpenAI");
        assert_eq!(provider.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_retryable_errors() {
        let rate_limited = LlmError::Http {
            provider: "OpenRouter",
            status: 429,
            body: String::new(),
        };
        let bad_request = LlmError::Http {
            provider: "OpenRouter",
            status: 400,
            body: String::new(),
        };
        assert!(rate_limited.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!LlmError::EmptyChoices { provider: "OpenRouter" }.is_retryable());
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![LLMMessage {
                role: "user".to_string(),
                content: "1. ?".to_string(),
            }],
            temperature: 0.0,
            max_tokens: 10,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["max_tokens"], 10);
        assert_eq!(value["messages"][0]["role"], "user");
        // The stop token has to reach the output, so it is never sent as a stop sequence
        assert!(value.get("stop").is_none());
    }
}
