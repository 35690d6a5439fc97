use std::time::Duration;

use thiserror::Error;

use crate::invoke::Retryable;

#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    #[error("sandbox base URL cannot be empty")]
    EmptyBaseUrl,

    #[error("failed to connect to sandbox: {0}")]
    Connection(String),

    #[error("sandbox request timed out: {0}")]
    Timeout(String),

    #[error("sandbox returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode sandbox response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SandboxError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SandboxError::Timeout(e.to_string())
        } else if e.is_connect() || e.is_request() {
            SandboxError::Connection(e.to_string())
        } else if e.is_decode() {
            SandboxError::Decode(e.to_string())
        } else {
            SandboxError::Connection(e.to_string())
        }
    }
}

impl Retryable for SandboxError {
    fn is_retryable(&self) -> bool {
        matches!(self, SandboxError::Connection(_) | SandboxError::Timeout(_))
    }

    fn is_connection_failure(&self) -> bool {
        matches!(self, SandboxError::Connection(_))
    }

    fn timed_out(after: Duration) -> Self {
        SandboxError::Timeout(format!("no response within {}s", after.as_secs_f64()))
    }
}
