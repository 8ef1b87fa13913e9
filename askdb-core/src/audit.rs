//! Attempt records and pipeline results: the audit trail of one question.

use crate::{AskError, FailureCause, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// One result row: an ordered sequence of scalar values.
pub type Row = Vec<serde_json::Value>;

/// What the data store did with a submitted query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success { rows: Vec<Row> },
    Failure { error: String },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            Self::Success { rows } => Some(rows),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }
}

/// The failed query and error fed into the next synthesis round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorFailure {
    pub query: String,
    pub error: String,
}

/// One synthesize-then-execute round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    /// Synthesized query; `None` when synthesis itself failed
    pub query: Option<String>,
    /// Executor outcome; `None` when no query was executed
    pub outcome: Option<ExecutionOutcome>,
    /// Error text of the previous round, if this round was a repair
    pub prior_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Terminal state of the retry controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryState {
    Attempting,
    Succeeded,
    Exhausted,
}

/// Everything computed for one question, including partial results on failure.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub request_id: Uuid,
    pub question: String,
    /// Tables chosen by the selector (empty when selection failed)
    pub tables: Vec<String>,
    /// Last attempted query
    pub query: Option<String>,
    /// Outcome of the last executed query
    pub outcome: Option<ExecutionOutcome>,
    /// Number of executor calls made
    pub retry_count: u32,
    pub max_attempts: u32,
    pub attempts: Vec<AttemptRecord>,
    pub summary: Option<String>,
    /// Likely cause of the last execution failure
    pub failure_cause: Option<FailureCause>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<AskError>,
    pub usage: TokenUsage,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl PipelineResult {
    /// Fresh result for `question`, before any stage ran.
    pub fn new(question: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            question: question.into(),
            tables: Vec::new(),
            query: None,
            outcome: None,
            retry_count: 0,
            max_attempts,
            attempts: Vec::new(),
            summary: None,
            failure_cause: None,
            error: None,
            usage: TokenUsage::default(),
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.outcome.as_ref().is_some_and(|o| o.is_success())
    }

    pub fn rows(&self) -> Option<&[Row]> {
        self.outcome.as_ref().and_then(|o| o.rows())
    }

    /// Error text of the last executed query.
    pub fn last_error(&self) -> Option<&str> {
        self.outcome.as_ref().and_then(|o| o.error())
    }
}

fn serialize_error<S: Serializer>(error: &Option<AskError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}
