use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::gateway::payload::ErrorResponse;
use crate::scoring::{ErrorKind, ScoreError};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InitializationFailed(String),

    #[error("{0}")]
    DownstreamFailed(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<ScoreError> for GatewayError {
    fn from(e: ScoreError) -> Self {
        match e.kind() {
            ErrorKind::Validation => GatewayError::InvalidRequest(e.to_string()),
            ErrorKind::Initialization => GatewayError::InitializationFailed(e.to_string()),
            ErrorKind::Transport | ErrorKind::Verification => {
                GatewayError::DownstreamFailed(e.to_string())
            }
            ErrorKind::Unexpected => GatewayError::InternalError(e.to_string()),
        }
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::InitializationFailed(_) => StatusCode::BAD_REQUEST,
            GatewayError::DownstreamFailed(_) => StatusCode::BAD_GATEWAY,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
