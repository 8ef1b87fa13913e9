//! Classification of data store error messages into likely causes.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

/// Likely cause category of a failed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Query referenced a table the store does not know
    TableMismatch,
    /// Query referenced a column that does not exist in its table
    ColumnMismatch,
    /// Join condition or join syntax rejected
    JoinCondition,
    /// Operand types do not match (e.g. text compared with a number)
    TypeMismatch,
    /// Statement could not be parsed in the store's dialect
    Syntax,
    /// Request never reached the store or timed out
    Transport,
    Unknown,
}

impl FailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TableMismatch => "table mismatch",
            Self::ColumnMismatch => "column mismatch",
            Self::JoinCondition => "join condition",
            Self::TypeMismatch => "data type mismatch",
            Self::Syntax => "SQL syntax",
            Self::Transport => "connection or timeout",
            Self::Unknown => "unknown",
        }
    }

    /// One-line explanation handed to the summarizer.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::TableMismatch => {
                "the query names a table that does not exist or is spelled differently"
            }
            Self::ColumnMismatch => {
                "the query names a column that does not exist in the referenced table; \
                 Access reports unknown columns as missing parameters"
            }
            Self::JoinCondition => "the join between tables is malformed or joins on the wrong columns",
            Self::TypeMismatch => "a value is compared with a column of a different data type",
            Self::Syntax => "the statement is not valid in the target SQL dialect",
            Self::Transport => "the data service could not be reached or did not answer in time",
            Self::Unknown => "the data store rejected the query for an unrecognized reason",
        }
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Order matters: the first matching pattern wins.
const PATTERNS: &[(FailureCause, &str)] = &[
    (FailureCause::Transport, r"(?i)timed out|request failed|connection (refused|reset)"),
    (FailureCause::JoinCondition, r"(?i)join (expression|operation|condition)|\bjoin\b.*not supported|ambiguous"),
    (FailureCause::TableMismatch, r"(?i)no such table|cannot find the input table|could not find (file|table)|invalid object name|table .* (does not exist|not found)"),
    (FailureCause::ColumnMismatch, r"(?i)no such column|too few parameters|unknown column|invalid column|column .* (does not exist|not found)"),
    (FailureCause::TypeMismatch, r"(?i)data type mismatch|type mismatch|conversion failed"),
    (FailureCause::Syntax, r"(?i)syntax error|missing operator|reserved word|invalid (sql )?statement|characters found after end"),
];

static PATTERN_SET: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new(PATTERNS.iter().map(|(_, p)| *p)).expect("valid regex set")
});

static ODBC_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*(ODBC|Microsoft)[^\]]*\]").expect("valid regex"));

/// Classify a store error message into its likely cause.
pub fn classify_failure(error: &str) -> FailureCause {
    // Driver prefixes like "[Microsoft][ODBC Microsoft Access Driver]" carry no signal.
    let message = ODBC_NOISE.replace_all(error, "");
    PATTERN_SET
        .matches(&message)
        .iter()
        .next()
        .map(|idx| PATTERNS[idx].0)
        .unwrap_or(FailureCause::Unknown)
}
