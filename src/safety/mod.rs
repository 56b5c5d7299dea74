//! Read-only query guard.
//!
//! Classifies raw SQL text as read-only or not before it is allowed anywhere
//! near a database connection. The guard is lexical: comments are stripped,
//! the text is split into words, and the words are checked against allow and
//! deny lists. A prohibited keyword inside a string literal is rejected too.

mod guard;

pub use guard::{check_read_only, classify, is_read_only, ALLOWED_LEADING, PROHIBITED};

use std::fmt;

/// Outcome of running the guard over a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Safe to send to a database.
    ReadOnly,
    /// Must not be executed.
    Rejected(RejectReason),
}

impl Verdict {
    /// Returns true if the query may be executed.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

/// Why a query was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Nothing but whitespace and comments.
    Empty,
    /// The first word is not one of the allowed statement keywords.
    LeadingKeyword(String),
    /// A data- or schema-modifying keyword appears somewhere in the text.
    ProhibitedKeyword(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "query is empty"),
            Self::LeadingKeyword(word) => write!(
                f,
                "statements starting with '{word}' are not allowed. \
                 Only SELECT, SHOW, DESCRIBE and EXPLAIN queries are allowed"
            ),
            Self::ProhibitedKeyword(word) => {
                write!(f, "'{word}' is not allowed in a read-only query")
            }
        }
    }
}
