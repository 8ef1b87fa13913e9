//! Table selection: map a question to the tables it needs.

use crate::prompt::{complete_text, GenerationParams};
use askdb_core::text::clean_prose;
use askdb_core::{AskResult, ChatMessage, CompletionRequest};
use askdb_llm::{CompletionProvider, UsageTracker};
use std::sync::Arc;

pub struct TableSelector {
    provider: Arc<dyn CompletionProvider>,
    params: GenerationParams,
    case_insensitive: bool,
}

impl TableSelector {
    pub fn new(provider: Arc<dyn CompletionProvider>, params: GenerationParams) -> Self {
        Self {
            provider,
            params,
            case_insensitive: false,
        }
    }

    /// Also accept names that match a known table only case-insensitively.
    pub fn with_case_insensitive_matching(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Tables from `available` the question needs, in the order named.
    ///
    /// Every returned name is a member of `available`. An empty result means
    /// no usable table was named; callers must not proceed.
    #[tracing::instrument(skip(self, available, usage), fields(available = available.len()))]
    pub async fn select(
        &self,
        question: &str,
        available: &[String],
        usage: &UsageTracker,
    ) -> AskResult<Vec<String>> {
        if available.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.params.apply(build_request(question, available));
        let raw = complete_text(self.provider.as_ref(), &request, usage).await?;
        let selected = match clean_prose(&raw) {
            Some(text) => match_tables(&text, available, self.case_insensitive),
            None => Vec::new(),
        };

        tracing::info!(selected = ?selected, "tables selected");
        Ok(selected)
    }
}

fn build_request(question: &str, available: &[String]) -> CompletionRequest {
    let mut system = String::from(
        "You decide which database tables are needed to answer a question.\n\
         Reply with the exact table names from the list below, one per line, and nothing else.\n\
         Include every table that might be needed; an unused table is harmless, a missing one is not.\n\
         If no table is relevant, reply NONE.\n\nAvailable tables:",
    );
    for table in available {
        system.push_str("\n- ");
        system.push_str(table);
    }

    CompletionRequest::new(vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("Question: {}", question)),
    ])
}

/// Known tables mentioned in `text`, ordered by first mention.
///
/// A mention must not be embedded in a longer identifier, so `Parts` does
/// not match inside `Parts_Archive`.
pub fn match_tables(text: &str, available: &[String], case_insensitive: bool) -> Vec<String> {
    let folded = text.to_lowercase();
    let mut found: Vec<(usize, &String)> = Vec::new();

    for table in available {
        let position = find_mention(text, table).or_else(|| {
            if case_insensitive {
                find_mention(&folded, &table.to_lowercase())
            } else {
                None
            }
        });
        if let Some(position) = position {
            found.push((position, table));
        }
    }

    found.sort_by_key(|(position, _)| *position);
    let mut selected: Vec<String> = Vec::with_capacity(found.len());
    for (_, table) in found {
        if !selected.contains(table) {
            selected.push(table.clone());
        }
    }
    selected
}

fn find_mention(haystack: &str, name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    haystack.match_indices(name).map(|(idx, _)| idx).find(|&idx| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + name.len()..].chars().next();
        !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
    })
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
