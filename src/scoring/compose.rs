use crate::constants::{ANSWER_WEIGHT, FORMAT_WEIGHT, clamp_score};

/// Final reward: `answer` alone, or `0.9 × answer + 0.1 × format` when format scoring
/// is enabled.
#[inline]
pub fn compose(answer: f64, format: Option<f64>) -> f64 {
    let reward = match format {
        Some(format) => ANSWER_WEIGHT * answer + FORMAT_WEIGHT * format,
        None => answer,
    };
    clamp_score(reward)
}
