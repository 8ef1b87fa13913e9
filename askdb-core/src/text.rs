//! Cleanup of raw completion text.
//!
//! Models wrap answers in markdown fences, emit reasoning traces, and leak
//! chat stop tokens. These helpers reduce a completion to its payload.

use once_cell::sync::Lazy;
use regex::Regex;

static REASONING_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n)?(.*?)```").expect("valid regex"));

static LINE_BREAKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*(\r\n|\r|\n)+[ \t]*").expect("valid regex"));

static LEADING_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(sql\s+query|sql|query)\s*:\s*").expect("valid regex"));

/// Chat template terminators some models leak into their output.
pub const STOP_TOKENS: &[&str] = &["<|eot_id|>", "<|end_of_text|>", "<|im_end|>", "<|endoftext|>"];

/// Remove `<think>` reasoning blocks and chat stop tokens.
///
/// A dangling `</think>` without its opening tag discards everything before it.
pub fn strip_reasoning(text: &str) -> String {
    let mut cleaned = REASONING_BLOCK.replace_all(text, "").into_owned();
    if let Some(idx) = cleaned.rfind("</think>") {
        cleaned = cleaned[idx + "</think>".len()..].to_string();
    }
    for token in STOP_TOKENS {
        cleaned = cleaned.replace(token, "");
    }
    cleaned
}

/// Contents of the first fenced code block, if any.
pub fn extract_fenced(text: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Collapse every line break (and the indentation around it) into one space.
pub fn collapse_line_breaks(text: &str) -> String {
    LINE_BREAKS.replace_all(text, " ").into_owned()
}

/// Reduce a raw completion to a single-line SQL statement.
///
/// Returns `None` when nothing usable remains.
pub fn clean_sql(raw: &str) -> Option<String> {
    let stripped = strip_reasoning(raw);
    let body = match extract_fenced(&stripped) {
        Some(inner) => inner.to_string(),
        None => stripped,
    };

    // Unterminated fences and inline backticks.
    let mut body = body.trim().to_string();
    if body.starts_with("```") {
        body = match body.find('\n') {
            Some(idx) => body[idx + 1..].to_string(),
            None => String::new(),
        };
    }
    let body = body.replace("```", "");
    let body = LEADING_LABEL.replace(body.trim(), "");
    let body = body.trim().trim_matches('`');

    let sql = collapse_line_breaks(body).trim().to_string();
    if sql.is_empty() {
        None
    } else {
        Some(sql)
    }
}

/// Reduce a raw completion to prose, dropping reasoning traces.
pub fn clean_prose(raw: &str) -> Option<String> {
    let text = strip_reasoning(raw).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_sql_plain() {
        assert_eq!(
            clean_sql("  SELECT TOP 5 [model] FROM [T]  ").as_deref(),
            Some("SELECT TOP 5 [model] FROM [T]")
        );
    }

    #[test]
    fn test_clean_sql_fenced_multiline() {
        let raw = "Here you go:\n```sql\nSELECT COUNT(*)\n  FROM [T]\n  WHERE [a] = '1'\n```\nHope it helps.";
        assert_eq!(
            clean_sql(raw).as_deref(),
            Some("SELECT COUNT(*) FROM [T] WHERE [a] = '1'")
        );
    }

    #[test]
    fn test_clean_sql_inline_fence_keeps_first_keyword() {
        assert_eq!(
            clean_sql("```SELECT [model] FROM [T]```").as_deref(),
            Some("SELECT [model] FROM [T]")
        );
        assert_eq!(
            clean_sql("Try this: ```SELECT COUNT(*) FROM [T]``` and run it.").as_deref(),
            Some("SELECT COUNT(*) FROM [T]")
        );
    }

    #[test]
    fn test_clean_sql_strips_reasoning_and_stop_token() {
        let raw = "<think>\nThe user wants a count.\n</think>\nSELECT COUNT(*) FROM [T]<|eot_id|>";
        assert_eq!(clean_sql(raw).as_deref(), Some("SELECT COUNT(*) FROM [T]"));
    }

    #[test]
    fn test_clean_sql_dangling_think_close() {
        let raw = "counting rows...</think>SELECT 1";
        assert_eq!(clean_sql(raw).as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_clean_sql_unterminated_fence() {
        let raw = "```sql\nSELECT [x]\nFROM [T]";
        assert_eq!(clean_sql(raw).as_deref(), Some("SELECT [x] FROM [T]"));
    }

    #[test]
    fn test_clean_sql_inline_backticks_and_label() {
        assert_eq!(
            clean_sql("SQL: `SELECT [x] FROM [T]`").as_deref(),
            Some("SELECT [x] FROM [T]")
        );
    }

    #[test]
    fn test_clean_sql_empty() {
        assert_eq!(clean_sql(""), None);
        assert_eq!(clean_sql("```sql\n```"), None);
        assert_eq!(clean_sql("<think>hmm</think>   "), None);
    }

    #[test]
    fn test_collapse_keeps_inline_spacing() {
        assert_eq!(
            collapse_line_breaks("WHERE [a] = 'x  y'\r\n\r\n  AND [b] = 1"),
            "WHERE [a] = 'x  y' AND [b] = 1"
        );
    }

    #[test]
    fn test_clean_prose() {
        assert_eq!(
            clean_prose("<think>plan</think>\nThere are 12 models.").as_deref(),
            Some("There are 12 models.")
        );
        assert_eq!(clean_prose("  "), None);
    }
}
