//! Completion provider implementations
//!
//! Concrete implementations of [`CompletionProvider`] for Ollama's native
//! chat API and OpenAI-compatible chat completion servers.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaCompletionProvider;
pub use openai::{OpenAIClient, OpenAICompletionProvider};

use crate::CompletionProvider;
use askdb_core::{AskError, AskResult, CompletionConfig, ConfigError, LlmError};

/// Build the provider named by `config.provider`, serving `model`.
pub fn build_provider(
    config: &CompletionConfig,
    model: &str,
) -> AskResult<Box<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaCompletionProvider::new(
            &config.endpoint,
            model,
            config.request_timeout(),
        )?)),
        "openai" => {
            let api_key = config.api_key.clone().ok_or(ConfigError::InvalidValue {
                field: "completion.api_key",
                reason: "required for the openai provider".to_string(),
            })?;
            let client = OpenAIClient::new(
                &config.endpoint,
                api_key,
                config.requests_per_minute,
                config.request_timeout(),
            )?;
            Ok(Box::new(OpenAICompletionProvider::new(client, model)))
        }
        other => Err(ConfigError::ProviderNotSupported {
            provider: other.to_string(),
        }
        .into()),
    }
}

pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> AskError {
    AskError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> AskError {
    AskError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> AskError {
    AskError::Llm(LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

/// Map a reqwest send error, separating timeouts from other failures.
pub(crate) fn transport_error(
    provider: &str,
    timeout: std::time::Duration,
    err: reqwest::Error,
) -> AskError {
    if err.is_timeout() {
        AskError::Llm(LlmError::Timeout {
            provider: provider.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    } else {
        request_failed(provider, 0, format!("HTTP request failed: {}", err))
    }
}
