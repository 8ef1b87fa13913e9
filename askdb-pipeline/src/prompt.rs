//! Shared helpers for building prompts and calling completion providers.

use askdb_core::{AskResult, CompletionConfig, CompletionRequest, Row};
use askdb_llm::{CompletionProvider, UsageTracker};

/// Sampling parameters applied to every stage's completion request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GenerationParams {
    pub max_tokens: Option<i32>,
    pub temperature: Option<f32>,
}

impl GenerationParams {
    pub fn from_config(config: &CompletionConfig) -> Self {
        Self {
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
        }
    }

    pub(crate) fn apply(&self, mut request: CompletionRequest) -> CompletionRequest {
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }
}

/// Call `provider` and record the reported token usage.
pub(crate) async fn complete_text(
    provider: &dyn CompletionProvider,
    request: &CompletionRequest,
    usage: &UsageTracker,
) -> AskResult<String> {
    let completion = provider.complete(request).await?;
    usage.record(completion.usage);
    tracing::debug!(
        provider = provider.provider_id(),
        model = %completion.model,
        chars = completion.text.len(),
        "completion received"
    );
    Ok(completion.text)
}

/// Render up to `limit` rows, one per line, values separated by ` | `.
pub fn format_rows(rows: &[Row], limit: usize) -> String {
    let mut lines: Vec<String> = rows
        .iter()
        .take(limit)
        .map(|row| {
            row.iter()
                .map(format_value)
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect();
    if rows.len() > limit {
        lines.push(format!("... ({} more rows)", rows.len() - limit));
    }
    lines.join("\n")
}

pub fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
