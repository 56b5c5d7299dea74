//! Lexical allow/deny classification of SQL text.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CourierError, Result};

use super::{RejectReason, Verdict};

/// Keywords a read-only query may start with.
pub const ALLOWED_LEADING: &[&str] = &["select", "show", "describe", "desc", "explain"];

/// Keywords that reject a query wherever they appear.
pub const PROHIBITED: &[&str] = &[
    "create", "alter", "drop", "insert", "update", "delete", "truncate", "rename", "replace",
    "load",
];

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)--.*$").expect("valid line comment pattern"));

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment pattern"));

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid word pattern"));

/// Classifies a query, reporting why it was rejected.
pub fn classify(sql: &str) -> Verdict {
    let without_line = LINE_COMMENT.replace_all(sql, "");
    let cleaned = BLOCK_COMMENT.replace_all(&without_line, "").to_lowercase();

    let words: Vec<&str> = WORD.find_iter(&cleaned).map(|m| m.as_str()).collect();

    let Some(first) = words.first() else {
        return Verdict::Rejected(RejectReason::Empty);
    };

    if !ALLOWED_LEADING.contains(first) {
        return Verdict::Rejected(RejectReason::LeadingKeyword(first.to_string()));
    }

    if let Some(word) = words.iter().find(|w| PROHIBITED.contains(*w)) {
        return Verdict::Rejected(RejectReason::ProhibitedKeyword(word.to_string()));
    }

    Verdict::ReadOnly
}

/// Returns true if the query is read-only.
pub fn is_read_only(sql: &str) -> bool {
    classify(sql).is_read_only()
}

/// Returns a `ReadOnlyViolation` error if the query is not read-only.
pub fn check_read_only(sql: &str) -> Result<()> {
    match classify(sql) {
        Verdict::ReadOnly => Ok(()),
        Verdict::Rejected(reason) => Err(CourierError::read_only(reason.to_string())),
    }
}
