//! HTTP gateway (Axum) exposing reward computation.

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;


use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::{ping_handler, reward_handler};
pub use payload::{ErrorResponse, PingResponse, RewardRequest, RewardResponse};
pub use state::HandlerState;

pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/reward", post(reward_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
