//! Error types shared across the Nudge crates.

use thiserror::Error;

/// Errors raised by the reminder engine and its persistence layer.
#[derive(Debug, Error)]
pub enum NudgeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Reminder not found: {0}")]
    NotFound(String),

    /// A write was attempted against a snapshot older than the latest committed one.
    #[error("Stale snapshot: expected version {expected}, store is at {actual}")]
    StaleSnapshot { expected: u64, actual: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl NudgeError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        NudgeError::Config(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        NudgeError::Storage(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        NudgeError::Validation(msg.into())
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        NudgeError::NotFound(id.into())
    }
}

pub type Result<T> = std::result::Result<T, NudgeError>;
