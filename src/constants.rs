//! Cross-cutting, shared constants.
//!
//! Markers and weights that more than one module must agree on live here so the
//! format scorer, the extractors and the HTTP handler never drift apart.

/// Weight of the answer-correctness score in the composed reward.
pub const ANSWER_WEIGHT: f64 = 0.9;

/// Weight of the format-compliance score in the composed reward.
pub const FORMAT_WEIGHT: f64 = 0.1;

/// Opening delimiter of the reasoning segment.
pub const THINK_OPEN: &str = "<think>";

/// Closing delimiter of the reasoning segment.
pub const THINK_CLOSE: &str = "</think>";

/// End-of-generation marker emitted by DeepSeek-style chat templates.
pub const DEFAULT_EOS_TOKEN: &str = "<｜end▁of▁sentence｜>";

/// Token that opens the assistant turn in a rendered chat transcript.
pub const DEFAULT_ASSISTANT_TOKEN: &str = "<｜Assistant｜>";

/// Marker that introduces a boxed math answer.
pub const BOXED_MARKER: &str = "\\boxed";

/// Language assumed for code answers that do not declare one.
pub const DEFAULT_CODE_LANGUAGE: &str = "python";

/// Context lines used when diffing SWE patches.
pub const DIFF_CONTEXT_LINES: usize = 3;

/// Clamps a raw score into `[0.0, 1.0]`, mapping NaN to `0.0`.
#[inline]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}
