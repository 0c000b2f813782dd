use thiserror::Error;

use crate::model::ScalarKind;

/// Core error type shared across graphseed crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The type model violates internal invariants.
    #[error("invalid model: {0}")]
    InvalidModel(String),
    /// A type name was not found in the model.
    #[error("unknown type '{0}'")]
    UnknownType(String),
    /// A model or data document could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A model document is not valid JSON for the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results returned by graphseed crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to turn record text into typed values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A scalar could not be coerced to its declared kind.
    #[error("cannot parse '{value}' as {kind}: {reason}")]
    InvalidScalar {
        value: String,
        kind: ScalarKind,
        reason: String,
    },
    /// Nested-record text does not follow the brace grammar.
    #[error("malformed record text at offset {offset}: {reason}")]
    MalformedRecord { offset: usize, reason: String },
    /// A field carried a scalar where a group was required, or the reverse.
    #[error("property '{property}' expects {expected}")]
    UnexpectedShape {
        property: String,
        expected: &'static str,
    },
}

impl ParseError {
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        ParseError::MalformedRecord {
            offset,
            reason: reason.into(),
        }
    }
}
