//! Chat-style markdown rendering of a pipeline result.

use crate::prompt::format_rows;
use askdb_core::{AskError, ExecutionOutcome, PipelineError, PipelineResult};
use std::fmt::Write as _;

const RENDERED_ROW_LIMIT: usize = 100;

/// Render `result` as markdown: the query in a SQL block, then the rows or
/// the error, then the summary.
pub fn render_markdown(result: &PipelineResult) -> String {
    let mut out = String::new();

    if let Some(query) = &result.query {
        let _ = write!(out, "Generated SQL Query:\n```sql\n{}\n```\n", query);
    }

    match &result.outcome {
        Some(ExecutionOutcome::Success { rows }) if rows.is_empty() => {
            out.push_str("\nResults: no rows\n");
        }
        Some(ExecutionOutcome::Success { rows }) => {
            let _ = write!(
                out,
                "\nResults ({} rows):\n```\n{}\n```\n",
                rows.len(),
                format_rows(rows, RENDERED_ROW_LIMIT)
            );
        }
        Some(ExecutionOutcome::Failure { error }) => {
            let _ = write!(out, "\nError after {} attempts:\n```\n{}\n```\n", result.retry_count, error);
        }
        None => {}
    }

    match &result.error {
        None | Some(AskError::Pipeline(PipelineError::RetryExhausted { .. })) => {}
        Some(err) => {
            let _ = writeln!(out, "\nError: {}", err);
        }
    }

    if let Some(summary) = &result.summary {
        let _ = writeln!(out, "\n{}", summary);
    }

    out.trim().to_string()
}
