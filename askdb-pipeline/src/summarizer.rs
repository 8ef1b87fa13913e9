//! Natural-language explanation of a result set or a final failure.

use crate::prompt::{complete_text, format_rows, GenerationParams};
use askdb_core::text::clean_prose;
use askdb_core::{
    classify_failure, ChatMessage, CompletionRequest, ExecutionOutcome, FailureCause,
    PipelineError,
};
use askdb_llm::{CompletionProvider, UsageTracker};
use std::fmt::Write as _;
use std::sync::Arc;

pub struct ResultSummarizer {
    provider: Arc<dyn CompletionProvider>,
    row_limit: usize,
    params: GenerationParams,
}

impl ResultSummarizer {
    pub fn new(provider: Arc<dyn CompletionProvider>, row_limit: usize, params: GenerationParams) -> Self {
        Self {
            provider,
            row_limit,
            params,
        }
    }

    /// Explain `outcome` in prose.
    ///
    /// Returns `None` when the completion fails or is empty; the caller then
    /// delivers the raw result without a summary. For failures the answer
    /// always names the likely cause category.
    #[tracing::instrument(skip_all, fields(success = outcome.is_success()))]
    pub async fn summarize(
        &self,
        question: &str,
        tables: &[String],
        query: Option<&str>,
        outcome: &ExecutionOutcome,
        usage: &UsageTracker,
    ) -> Option<String> {
        let cause = outcome.error().map(classify_failure);
        let request = self
            .params
            .apply(self.build_request(question, tables, query, outcome, cause));

        let raw = match complete_text(self.provider.as_ref(), &request, usage).await {
            Ok(raw) => raw,
            Err(err) => {
                let err = PipelineError::SummaryUnavailable {
                    reason: err.to_string(),
                };
                tracing::warn!(error = %err, "continuing without summary");
                return None;
            }
        };

        let Some(summary) = clean_prose(&raw) else {
            tracing::warn!("summary completion was empty");
            return None;
        };

        Some(match cause {
            Some(cause) if !mentions_cause(&summary, cause) => {
                format!("Likely cause: {}. {}", cause, summary)
            }
            _ => summary,
        })
    }

    fn build_request(
        &self,
        question: &str,
        tables: &[String],
        query: Option<&str>,
        outcome: &ExecutionOutcome,
        cause: Option<FailureCause>,
    ) -> CompletionRequest {
        let system = match outcome {
            ExecutionOutcome::Success { .. } => {
                "Given a user question, the SQL query that was run and its result, \
                 answer the question in plain language. Be concise and only state what the result shows."
            }
            ExecutionOutcome::Failure { .. } => {
                "A SQL query written for a user question failed. Explain to the user, in plain language, \
                 why it most likely failed. Name the likely cause category given below and suggest \
                 how the question could be rephrased."
            }
        };

        let mut user = format!("Question: {}\nTables: {}", question, tables.join(", "));
        if let Some(query) = query {
            let _ = write!(user, "\nSQL Query: {}", query);
        }
        match outcome {
            ExecutionOutcome::Success { rows } if rows.is_empty() => {
                user.push_str("\nSQL Result: no rows");
            }
            ExecutionOutcome::Success { rows } => {
                let _ = write!(
                    user,
                    "\nSQL Result ({} rows):\n{}",
                    rows.len(),
                    format_rows(rows, self.row_limit)
                );
            }
            ExecutionOutcome::Failure { error } => {
                let _ = write!(user, "\nError: {}", error);
                if let Some(cause) = cause {
                    let _ = write!(user, "\nLikely cause category: {} ({})", cause, cause.hint());
                }
            }
        }

        CompletionRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }
}

fn mentions_cause(summary: &str, cause: FailureCause) -> bool {
    summary.to_lowercase().contains(&cause.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::LlmError;
    use askdb_llm::MockCompletionProvider;
    use askdb_test_utils::fixtures;

    fn tables() -> Vec<String> {
        vec![fixtures::ACES_TABLE.to_string()]
    }

    #[tokio::test]
    async fn test_success_summary_includes_rows_in_prompt() {
        let provider = Arc::new(MockCompletionProvider::scripted([
            "<think>three rows</think>Three models fit part 513001: Civic, Accord and CR-V.",
        ]));
        let summarizer = ResultSummarizer::new(provider.clone(), 2, GenerationParams::default());
        let outcome = ExecutionOutcome::Success {
            rows: fixtures::model_rows(),
        };

        let summary = summarizer
            .summarize("which models fit 513001", &tables(), Some("SELECT ..."), &outcome, &UsageTracker::new())
            .await;

        assert_eq!(
            summary.as_deref(),
            Some("Three models fit part 513001: Civic, Accord and CR-V.")
        );
        let prompt = provider.requests()[0].full_text();
        assert!(prompt.contains("SQL Result (3 rows):\nCivic\nAccord\n... (1 more rows)"));
    }

    #[tokio::test]
    async fn test_failure_summary_names_cause() {
        let provider = Arc::new(MockCompletionProvider::scripted([
            "The query asked for a field that is not in the table.",
        ]));
        let summarizer = ResultSummarizer::new(provider.clone(), 10, GenerationParams::default());
        let outcome = ExecutionOutcome::Failure {
            error: "[Microsoft][ODBC Microsoft Access Driver] Too few parameters. Expected 1.".to_string(),
        };

        let summary = summarizer
            .summarize("list models", &tables(), Some("SELECT [modle]"), &outcome, &UsageTracker::new())
            .await
            .unwrap();

        assert!(summary.starts_with("Likely cause: column mismatch."));
        assert!(provider.requests()[0]
            .full_text()
            .contains("Likely cause category: column mismatch"));
    }

    #[tokio::test]
    async fn test_failure_summary_already_naming_cause_is_kept() {
        let provider = Arc::new(MockCompletionProvider::scripted([
            "This looks like a Column Mismatch: [modle] does not exist.",
        ]));
        let summarizer = ResultSummarizer::new(provider, 10, GenerationParams::default());
        let outcome = ExecutionOutcome::Failure {
            error: "no such column [modle]".to_string(),
        };

        let summary = summarizer
            .summarize("list models", &tables(), None, &outcome, &UsageTracker::new())
            .await
            .unwrap();
        assert_eq!(summary, "This looks like a Column Mismatch: [modle] does not exist.");
    }

    #[tokio::test]
    async fn test_completion_failure_yields_none() {
        let provider = Arc::new(
            MockCompletionProvider::scripted(Vec::<String>::new()).then_fail(LlmError::RequestFailed {
                provider: "mock".to_string(),
                status: 503,
                message: "overloaded".to_string(),
            }),
        );
        let summarizer = ResultSummarizer::new(provider, 10, GenerationParams::default());
        let outcome = ExecutionOutcome::Success { rows: Vec::new() };

        assert!(summarizer
            .summarize("q", &tables(), None, &outcome, &UsageTracker::new())
            .await
            .is_none());
    }
}
