use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::{debug, error, instrument, warn};

use crate::extract::assistant_response;
use crate::gateway::error::GatewayError;
use crate::gateway::payload::{PingResponse, RewardRequest, RewardResponse};
use crate::gateway::state::HandlerState;
use crate::scoring::ErrorKind;

#[instrument]
pub async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse::ok())
}

#[instrument(skip(state, payload))]
pub async fn reward_handler(
    State(state): State<HandlerState>,
    payload: Result<Json<RewardRequest>, JsonRejection>,
) -> Result<Json<RewardResponse>, GatewayError> {
    let Json(request) = payload.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;

    let llm_output = assistant_response(&request.llm_output, &state.assistant_token);
    debug!(
        output_len = llm_output.len(),
        transcript_len = request.llm_output.len(),
        "scoring reward request"
    );

    let score = state
        .engine
        .score_json(llm_output, &request.verification_info)
        .await
        .map_err(|e| {
            match e.kind() {
                ErrorKind::Validation => debug!(error = %e, "rejected verification info"),
                ErrorKind::Initialization => warn!(error = %e, "verifier unavailable"),
                ErrorKind::Transport | ErrorKind::Verification | ErrorKind::Unexpected => {
                    error!(error = %e, "reward computation failed")
                }
            }
            GatewayError::from(e)
        })?;

    Ok(Json(RewardResponse { score }))
}
