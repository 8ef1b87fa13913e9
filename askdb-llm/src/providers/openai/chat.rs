//! Chat completion provider for OpenAI-compatible servers

use super::client::OpenAIClient;
use super::types::{ChatCompletionRequest, ChatCompletionResponse, Message};
use crate::providers::invalid_response;
use crate::CompletionProvider;
use askdb_core::text::STOP_TOKENS;
use askdb_core::{AskResult, Completion, CompletionRequest, TokenUsage};
use async_trait::async_trait;

const PROVIDER: &str = "openai";

#[derive(Debug)]
pub struct OpenAICompletionProvider {
    client: OpenAIClient,
    model: String,
}

impl OpenAICompletionProvider {
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| Message {
                    role: m.role.as_str().to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            // Most servers cap the stop list at four entries.
            stop: STOP_TOKENS.iter().take(4).map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletionProvider {
    #[tracing::instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> AskResult<Completion> {
        let body = self.build_request(request);
        let response: ChatCompletionResponse =
            self.client.post("chat/completions", &body).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| invalid_response(PROVIDER, "No completion choices returned"))?;

        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!(model = %self.model, "completion truncated at max_tokens");
        }

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            model: response.model.unwrap_or_else(|| self.model.clone()),
            usage: response
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens.unwrap_or(0))),
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider_id(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::ChatMessage;
    use std::time::Duration;

    fn provider() -> OpenAICompletionProvider {
        let client =
            OpenAIClient::new("http://localhost:8000/v1", "k", 60, Duration::from_secs(5)).unwrap();
        OpenAICompletionProvider::new(client, "gpt-4o-mini")
    }

    #[test]
    fn test_build_request() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("You write SQL."),
            ChatMessage::user("How many parts?"),
        ])
        .with_max_tokens(512);

        let body = serde_json::to_value(provider().build_request(&request)).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 512);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["stop"].as_array().map(|s| s.len()), Some(4));
    }

    #[test]
    fn test_response_parsing_tolerates_missing_usage() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"SELECT 1"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("SELECT 1"));
    }
}
