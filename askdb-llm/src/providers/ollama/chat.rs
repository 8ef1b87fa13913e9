//! Ollama chat completion provider

use super::types::{ApiError, ChatOptions, ChatRequest, ChatResponse, Message};
use crate::providers::{invalid_response, request_failed, transport_error};
use crate::CompletionProvider;
use askdb_core::{AskResult, Completion, CompletionRequest, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const PROVIDER: &str = "ollama";

/// Ollama completion provider for local LLM models.
pub struct OllamaCompletionProvider {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaCompletionProvider {
    /// Create a new Ollama completion provider.
    ///
    /// # Arguments
    /// * `base_url` - Ollama server URL (e.g., "http://localhost:11434")
    /// * `model` - Model name (e.g., "llama3.1", "deepseek-r1")
    /// * `timeout` - Bound on each request round-trip
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> AskResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| request_failed(PROVIDER, 0, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
            model: model.into(),
            timeout,
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        ChatRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| Message {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
            options,
        }
    }
}

/// Accept both the server root and the chat endpoint itself.
fn normalize_base_url(base_url: &str) -> String {
    base_url
        .trim_end_matches('/')
        .trim_end_matches("/api/chat")
        .trim_end_matches('/')
        .to_string()
}

#[async_trait]
impl CompletionProvider for OllamaCompletionProvider {
    #[tracing::instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> AskResult<Completion> {
        let body = self.build_request(request);
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(request_failed(PROVIDER, status.as_u16() as i32, message));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)))?;

        if !chat.done {
            tracing::warn!(model = %chat.model, "ollama returned an unfinished completion");
        }

        let usage = match (chat.prompt_eval_count, chat.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(TokenUsage::new(
                prompt.unwrap_or(0),
                completion.unwrap_or(0),
            )),
        };

        Ok(Completion {
            text: chat.message.content,
            model: chat.model,
            usage,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider_id(&self) -> &str {
        PROVIDER
    }
}

impl std::fmt::Debug for OllamaCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaCompletionProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::ChatMessage;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://10.10.12.30:11435/api/chat"), "http://10.10.12.30:11435");
        assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
    }

    #[test]
    fn test_build_request_maps_roles_and_options() {
        let provider =
            OllamaCompletionProvider::new("http://localhost:11434", "deepseek-r1", Duration::from_secs(5))
                .unwrap();
        let request = CompletionRequest::new(vec![
            ChatMessage::system("rules"),
            ChatMessage::user("question"),
        ])
        .with_max_tokens(100)
        .with_temperature(0.3);

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(body["model"], "deepseek-r1");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "question");
        assert_eq!(body["options"]["num_predict"], 100);
    }

    #[test]
    fn test_build_request_without_options() {
        let provider =
            OllamaCompletionProvider::new("http://localhost:11434", "llama3.1", Duration::from_secs(5))
                .unwrap();
        let body = serde_json::to_value(provider.build_request(&CompletionRequest::prompt("hi"))).unwrap();
        assert!(body.get("options").is_none());
    }

    #[test]
    fn test_chat_response_parses() {
        let json = r#"{"model":"deepseek-r1","message":{"role":"assistant","content":"SELECT 1"},"done":true,"prompt_eval_count":12,"eval_count":3}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.message.content, "SELECT 1");
        assert_eq!(parsed.eval_count, Some(3));
    }
}
