//! Error types shared by the csnd crates.
//!
//! [`CsndError`] covers everything that can go wrong before an optimization
//! starts: reading files, malformed instance data and bad configuration.
//! Solver and refinement failures live in `csnd-algo` and wrap this type.

use std::fmt;

use thiserror::Error;

/// Which part of an instance a validation failure points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// The counts line.
    Header,
    /// Arc at the given 0-based position.
    Arc(usize),
    /// Commodity at the given 0-based position.
    Commodity(usize),
    /// Content after the last expected record.
    Trailing,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Header => write!(f, "header"),
            Record::Arc(i) => write!(f, "arc #{}", i + 1),
            Record::Commodity(k) => write!(f, "commodity #{}", k + 1),
            Record::Trailing => write!(f, "trailing data"),
        }
    }
}

/// Errors raised while loading, validating or discretizing an instance.
#[derive(Error, Debug)]
pub enum CsndError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Instance data that cannot describe a network design problem
    #[error("malformed instance: {record}{}, field `{field}`: {reason}", line_suffix(.line))]
    MalformedInstance {
        record: Record,
        line: Option<usize>,
        field: &'static str,
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Time point sets that break the discretization rules
    #[error("Discretization error: {0}")]
    Discretization(String),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" (line {line})"),
        None => String::new(),
    }
}

impl CsndError {
    pub fn malformed(record: Record, field: &'static str, reason: impl Into<String>) -> Self {
        CsndError::MalformedInstance {
            record,
            line: None,
            field,
            reason: reason.into(),
        }
    }

    /// Attach a 1-based input line to a malformed-instance error.
    ///
    /// Other variants are returned unchanged.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            CsndError::MalformedInstance {
                record,
                field,
                reason,
                ..
            } => CsndError::MalformedInstance {
                record,
                line: Some(line),
                field,
                reason,
            },
            other => other,
        }
    }
}

/// Convenience type alias for Results using CsndError.
pub type CsndResult<T> = Result<T, CsndError>;
