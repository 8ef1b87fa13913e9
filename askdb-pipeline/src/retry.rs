//! Synthesize-then-execute rounds with error feedback.
//!
//! `ATTEMPTING → SUCCEEDED | EXHAUSTED`. A failed execution feeds its error
//! text into the next synthesis; a failed synthesis ends the run at once.
//! At most `max_attempts` executor calls are made.

use crate::executor::QueryExecutor;
use crate::synthesizer::SqlSynthesizer;
use askdb_core::{
    AskError, AttemptRecord, ExecutionOutcome, PipelineError, PriorFailure, RetryState,
    TableSchema,
};
use askdb_llm::UsageTracker;
use chrono::Utc;
use std::time::Instant;

/// Everything one retry run produced.
#[derive(Debug, Clone)]
pub struct RetryReport {
    pub state: RetryState,
    pub attempts: Vec<AttemptRecord>,
    /// Last query handed to the executor
    pub last_query: Option<String>,
    /// Outcome of that query
    pub last_outcome: Option<ExecutionOutcome>,
    /// Executor calls made
    pub executions: u32,
    /// Terminal error when the run did not succeed
    pub error: Option<AskError>,
}

impl RetryReport {
    fn new() -> Self {
        Self {
            state: RetryState::Attempting,
            attempts: Vec::new(),
            last_query: None,
            last_outcome: None,
            executions: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryController {
    max_attempts: u32,
}

impl RetryController {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[tracing::instrument(skip_all, fields(max_attempts = self.max_attempts))]
    pub async fn run(
        &self,
        synthesizer: &SqlSynthesizer,
        executor: &QueryExecutor,
        question: &str,
        tables: &[String],
        schemas: &[TableSchema],
        usage: &UsageTracker,
    ) -> RetryReport {
        let mut report = RetryReport::new();
        let mut prior: Option<PriorFailure> = None;

        for attempt in 1..=self.max_attempts {
            let started_at = Utc::now();
            let clock = Instant::now();
            tracing::info!("query synthesis attempt {}/{}", attempt, self.max_attempts);

            let query = match synthesizer
                .synthesize(tables, schemas, question, prior.as_ref(), usage)
                .await
            {
                Ok(query) => query,
                Err(err) => {
                    tracing::warn!("synthesis failed on attempt {}: {}", attempt, err);
                    report.attempts.push(AttemptRecord {
                        attempt,
                        query: None,
                        outcome: None,
                        prior_error: prior.as_ref().map(|p| p.error.clone()),
                        started_at,
                        elapsed_ms: clock.elapsed().as_millis() as u64,
                    });
                    report.state = RetryState::Exhausted;
                    report.error = Some(err);
                    return report;
                }
            };

            let outcome = executor.execute(&query).await;
            report.executions += 1;
            report.attempts.push(AttemptRecord {
                attempt,
                query: Some(query.clone()),
                outcome: Some(outcome.clone()),
                prior_error: prior.as_ref().map(|p| p.error.clone()),
                started_at,
                elapsed_ms: clock.elapsed().as_millis() as u64,
            });
            report.last_query = Some(query.clone());
            report.last_outcome = Some(outcome.clone());

            match outcome {
                ExecutionOutcome::Success { .. } => {
                    tracing::info!("query succeeded on attempt {}", attempt);
                    report.state = RetryState::Succeeded;
                    return report;
                }
                ExecutionOutcome::Failure { error } => {
                    let failure = AskError::from(PipelineError::ExecutionFailed {
                        message: error.clone(),
                    });
                    tracing::warn!(
                        recoverable = failure.is_recoverable(),
                        "attempt {} failed: {}",
                        attempt,
                        failure
                    );
                    if !self.continues_after(attempt, &failure) {
                        report.state = RetryState::Exhausted;
                        report.error = Some(
                            PipelineError::RetryExhausted {
                                attempts: report.executions,
                                last_query: query,
                                last_error: error,
                            }
                            .into(),
                        );
                        return report;
                    }
                    prior = Some(PriorFailure { query, error });
                }
            }
        }

        // Unreachable with max_attempts >= 1.
        report.state = RetryState::Exhausted;
        report
    }

    /// Whether another round follows a failed `attempt`.
    fn continues_after(&self, attempt: u32, failure: &AskError) -> bool {
        attempt < self.max_attempts && failure.is_recoverable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::GenerationParams;
    use askdb_core::{AccessDialect, LlmError};
    use askdb_llm::MockCompletionProvider;
    use askdb_test_utils::{fixtures, InMemoryDataAccess};
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        provider: Arc<MockCompletionProvider>,
        access: Arc<InMemoryDataAccess>,
        report: RetryReport,
    }

    async fn run(provider: MockCompletionProvider, access: InMemoryDataAccess, max: u32) -> Harness {
        let provider = Arc::new(provider);
        let access = Arc::new(access);
        let synthesizer =
            SqlSynthesizer::new(provider.clone(), &AccessDialect, 5, GenerationParams::default());
        let executor = QueryExecutor::new(access.clone(), Duration::from_secs(5));
        let tables = vec![fixtures::ACES_TABLE.to_string()];
        let schemas = vec![TableSchema::new(fixtures::ACES_TABLE, fixtures::aces_columns())];

        let report = RetryController::new(max)
            .run(&synthesizer, &executor, "list models", &tables, &schemas, &UsageTracker::new())
            .await;
        Harness {
            provider,
            access,
            report,
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let h = run(
            MockCompletionProvider::scripted(["SELECT TOP 5 [model] FROM [ProductApplication_ACES]"]),
            InMemoryDataAccess::new().then_rows(fixtures::model_rows()),
            3,
        )
        .await;

        assert_eq!(h.report.state, RetryState::Succeeded);
        assert_eq!(h.report.executions, 1);
        assert_eq!(h.report.attempts.len(), 1);
        assert!(h.report.error.is_none());
        assert!(h.report.attempts[0].prior_error.is_none());
    }

    #[tokio::test]
    async fn test_error_fed_into_next_round() {
        let h = run(
            MockCompletionProvider::scripted([
                "SELECT [model_x] FROM [ProductApplication_ACES]",
                "SELECT [model] FROM [ProductApplication_ACES]",
            ]),
            InMemoryDataAccess::new()
                .then_error("no such column [model_x]")
                .then_rows(fixtures::model_rows()),
            3,
        )
        .await;

        assert_eq!(h.report.state, RetryState::Succeeded);
        assert_eq!(h.report.executions, 2);
        assert_eq!(
            h.report.attempts[1].prior_error.as_deref(),
            Some("no such column [model_x]")
        );
        assert!(h.provider.requests()[1].full_text().contains("no such column [model_x]"));
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_query_and_error() {
        let h = run(
            MockCompletionProvider::from_fn(|_| Ok("SELECT [nope] FROM [ProductApplication_ACES]".to_string())),
            InMemoryDataAccess::new().with_responder(|_| {
                askdb_catalog::QueryResponse::Error("no such column [nope]".to_string())
            }),
            3,
        )
        .await;

        assert_eq!(h.report.state, RetryState::Exhausted);
        assert_eq!(h.report.executions, 3);
        assert_eq!(h.access.query_calls(), 3);
        match &h.report.error {
            Some(AskError::Pipeline(PipelineError::RetryExhausted {
                attempts,
                last_query,
                last_error,
            })) => {
                assert_eq!(*attempts, 3);
                assert_eq!(last_query, "SELECT [nope] FROM [ProductApplication_ACES]");
                assert_eq!(last_error, "no such column [nope]");
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_synthesis_failure_short_circuits() {
        let h = run(
            MockCompletionProvider::scripted(["SELECT [model_x] FROM [ProductApplication_ACES]"])
                .then_fail(LlmError::Timeout {
                    provider: "mock".to_string(),
                    timeout_ms: 1000,
                }),
            InMemoryDataAccess::new().then_error("no such column [model_x]"),
            3,
        )
        .await;

        assert_eq!(h.report.state, RetryState::Exhausted);
        assert_eq!(h.report.executions, 1);
        assert_eq!(h.report.attempts.len(), 2);
        assert!(h.report.attempts[1].query.is_none());
        assert!(matches!(h.report.error, Some(AskError::Llm(LlmError::Timeout { .. }))));
        assert_eq!(h.provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryController::new(0).max_attempts(), 1);
    }

    #[test]
    fn test_only_recoverable_failures_continue() {
        let controller = RetryController::new(3);
        let execution = AskError::from(PipelineError::ExecutionFailed {
            message: "no such column [model_x]".to_string(),
        });

        assert!(controller.continues_after(1, &execution));
        assert!(controller.continues_after(2, &execution));
        assert!(!controller.continues_after(3, &execution));
        assert!(!controller.continues_after(1, &AskError::from(PipelineError::NoRelevantTable)));
        assert!(!controller.continues_after(
            1,
            &AskError::from(LlmError::Timeout {
                provider: "mock".to_string(),
                timeout_ms: 1000,
            })
        ));
    }
}
