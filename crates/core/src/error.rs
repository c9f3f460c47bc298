//! Core Error Types
//!
//! Errors of the pure sequencing engine. The application crate wraps them
//! together with storage, session and submission failures.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Model definition errors (duplicate field names, dangling gates)
    #[error("Model error: {0}")]
    Model(String),

    /// An answer failed its field's rule
    #[error("Validation error: {0}")]
    Validation(String),

    /// A question key does not resolve in the current traversal
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed question key
    #[error("Parse error: {0}")]
    Parse(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Whether this error came from a field rule rather than a lookup.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
