use serde::{Deserialize, Serialize};

/// Body of `POST /reward`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RewardRequest {
    pub llm_output: String,
    /// JSON-encoded verification spec.
    pub verification_info: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RewardResponse {
    pub score: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PingResponse {
    pub status: String,
    pub message: String,
}

impl PingResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: "RL Verifier service is running".to_string(),
        }
    }
}

/// Error body shared by every non-2xx response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}
