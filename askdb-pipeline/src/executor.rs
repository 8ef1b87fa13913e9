//! Query execution against the data access service.

use askdb_catalog::{DataAccess, QueryResponse};
use askdb_core::ExecutionOutcome;
use std::sync::Arc;
use std::time::Duration;

/// Forwards queries unchanged and classifies the answer.
///
/// Never retries and never validates: transport failures and timeouts are
/// reported as failure outcomes so the retry controller can react.
#[derive(Clone)]
pub struct QueryExecutor {
    access: Arc<dyn DataAccess>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(access: Arc<dyn DataAccess>, timeout: Duration) -> Self {
        Self { access, timeout }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, query: &str) -> ExecutionOutcome {
        let outcome = match tokio::time::timeout(self.timeout, self.access.query(query)).await {
            Ok(Ok(QueryResponse::Rows(rows))) => ExecutionOutcome::Success { rows },
            Ok(Ok(QueryResponse::Error(error))) => ExecutionOutcome::Failure { error },
            Ok(Err(err)) => ExecutionOutcome::Failure {
                error: err.to_string(),
            },
            Err(_) => ExecutionOutcome::Failure {
                error: format!("query timed out after {}ms", self.timeout.as_millis()),
            },
        };

        match &outcome {
            ExecutionOutcome::Success { rows } => tracing::debug!(rows = rows.len(), "query succeeded"),
            ExecutionOutcome::Failure { error } => tracing::debug!(%error, "query rejected"),
        }
        outcome
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("timeout", &self.timeout)
            .finish()
    }
}
