use std::time::Duration;

use thiserror::Error;

use crate::invoke::Retryable;

/// Failure of one call to a remote verifier service.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("no verifier endpoints configured")]
    NoEndpoints,

    #[error("failed to connect to the server: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Rejected locally or by the service with 422.
    #[error("invalid request data: {0}")]
    Validation(String),

    /// The service could not build the verifier (400).
    #[error("verification failed: {0}")]
    Verification(String),

    #[error("server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout(e.to_string())
        } else if e.is_connect() || e.is_request() {
            ClientError::Connection(e.to_string())
        } else {
            ClientError::Unexpected(e.to_string())
        }
    }
}

impl Retryable for ClientError {
    fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Connection(_) | ClientError::Timeout(_))
    }

    fn is_connection_failure(&self) -> bool {
        matches!(self, ClientError::Connection(_))
    }

    fn timed_out(after: Duration) -> Self {
        ClientError::Timeout(format!("no response within {}s", after.as_secs_f64()))
    }
}
