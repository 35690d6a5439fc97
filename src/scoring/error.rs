use thiserror::Error;

use super::types::TaskType;

/// Coarse classification of a [`ScoreError`], used at boundaries that decide between
/// retrying, surfacing and substituting a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unsupported input. Never retried.
    Validation,
    /// A scorer could not be constructed.
    Initialization,
    /// Connection failure or timeout talking to a remote collaborator.
    Transport,
    /// The remote collaborator answered, but reported a failure.
    Verification,
    /// Anything else.
    Unexpected,
}

#[derive(Debug, Clone, Error)]
pub enum ScoreError {
    #[error("invalid verification info: {reason}")]
    Validation { reason: String },

    #[error("the verification type {value} is not supported")]
    UnsupportedType { value: String },

    #[error("failed to initialize {task_type} verifier: {reason}")]
    Initialization { task_type: TaskType, reason: String },

    #[error("transport failure calling {service}: {reason}")]
    Transport {
        service: &'static str,
        reason: String,
    },

    #[error("{service} reported a failure: {reason}")]
    Verification {
        service: &'static str,
        reason: String,
    },

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ScoreError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn initialization(task_type: TaskType, reason: impl Into<String>) -> Self {
        Self::Initialization {
            task_type,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoreError::Validation { .. } | ScoreError::UnsupportedType { .. } => {
                ErrorKind::Validation
            }
            ScoreError::Initialization { .. } => ErrorKind::Initialization,
            ScoreError::Transport { .. } => ErrorKind::Transport,
            ScoreError::Verification { .. } => ErrorKind::Verification,
            ScoreError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}
