//! SQL dialect policy.
//!
//! The backing store only accepts its own dialect, so the rules handed to the
//! synthesizer are fixed per dialect rather than derived from ANSI SQL.

use serde::{Deserialize, Serialize};

/// Syntactic conventions of a target SQL dialect.
pub trait SqlDialect: Send + Sync {
    /// Human-readable dialect name used in prompts.
    fn name(&self) -> &str;

    /// Quote a table or column identifier.
    fn quote_identifier(&self, identifier: &str) -> String;

    /// Rule lines for the synthesis prompt. `row_cap` is the default number
    /// of rows to request when the question does not give a count.
    fn rules(&self, row_cap: u32) -> Vec<String>;

    /// Query counting the rows of `table`.
    fn count_rows_query(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", self.quote_identifier(table))
    }
}

/// Supported dialects, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    Access,
}

impl DialectKind {
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Self::Access => &AccessDialect,
        }
    }
}

/// Microsoft Access SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessDialect;

impl SqlDialect for AccessDialect {
    fn name(&self) -> &str {
        "Microsoft Access SQL"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        // Access has no escape for `]` inside brackets.
        format!("[{}]", identifier.replace(']', ""))
    }

    fn rules(&self, row_cap: u32) -> Vec<String> {
        vec![
            "Use TOP n immediately after SELECT (or SELECT DISTINCT) instead of LIMIT n at the end."
                .to_string(),
            "Enclose every table and column name in square brackets, e.g. [Product Name]."
                .to_string(),
            "Date literals use # instead of quotes, e.g. #2024-05-19#.".to_string(),
            "String concatenation uses & instead of ||.".to_string(),
            "Use * as the wildcard in LIKE patterns.".to_string(),
            "When more than one table is involved, qualify every column with its table, e.g. [Orders].[item_id]."
                .to_string(),
            format!(
                "Unless the question asks for a specific number of rows, return at most {} rows using TOP {}.",
                row_cap, row_cap
            ),
            "Never select all columns with *; request only the columns relevant to the question."
                .to_string(),
            "Use DISTINCT to avoid returning duplicates wherever possible.".to_string(),
        ]
    }
}
