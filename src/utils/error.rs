//! Error Handling
//!
//! Application error type. Core engine errors convert into it; validation
//! messages display without a prefix because they are shown to the user.

use thiserror::Error;
use wizard_flow_core::CoreError;

#[derive(Error, Debug)]
pub enum AppError {
    /// Answer rejected by a field rule or a gate
    #[error("{0}")]
    Validation(String),

    /// No session is bound to the wizard
    #[error("Session missing: {0}")]
    SessionMissing(String),

    /// Step submission failed
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Pool or connection failures
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Invalid config file or wizard model definition
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored documents that no longer parse
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unknown question key, item or wizard step
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn session_missing(msg: impl Into<String>) -> Self {
        Self::SessionMissing(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::NotFound(msg) => Self::NotFound(msg),
            CoreError::Model(msg) => Self::Config(msg),
            CoreError::Parse(msg) => Self::Validation(msg),
        }
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        Self::Database(err.to_string())
    }
}
