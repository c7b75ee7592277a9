//! Typed failures returned by the merge core.
//!
//! The core never decides how a failure is presented; the command layer wraps
//! these in `anyhow` context and prints them.

use thiserror::Error;

/// Which side of a generic merge a precondition refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Unable to read '{source_name}' as a spreadsheet: {reason}")]
    Unreadable { source_name: String, reason: String },

    #[error("Key column for file {side} must be selected")]
    MissingKey { side: Side },

    #[error("File {set} is missing column(s): {}", columns.join(", "))]
    MissingColumns { set: String, columns: Vec<String> },

    #[error("Similarity threshold must lie between 0 and 1 (got {0})")]
    InvalidThreshold(f64),

    #[error("Failed to write output: {0}")]
    Write(String),
}

impl MergeError {
    pub fn unreadable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        MergeError::Unreadable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

pub type MergeResult<T> = Result<T, MergeError>;
