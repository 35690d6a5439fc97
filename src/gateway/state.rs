use std::sync::Arc;

use crate::constants::DEFAULT_ASSISTANT_TOKEN;
use crate::scoring::RewardEngine;

#[derive(Clone)]
pub struct HandlerState {
    pub engine: Arc<RewardEngine>,

    /// Text before the last occurrence of this token is prompt, not model output.
    pub assistant_token: Arc<str>,
}

impl HandlerState {
    pub fn new(engine: Arc<RewardEngine>, assistant_token: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            assistant_token: assistant_token.into(),
        }
    }

    pub fn with_default_token(engine: Arc<RewardEngine>) -> Self {
        Self::new(engine, DEFAULT_ASSISTANT_TOKEN)
    }
}
