//! Patch-similarity scoring for software-engineering edits.
//!
//! The model's edited file is compared with the reference edit through their diffs
//! against the shared original, so only the changed regions (plus context) count.

use async_trait::async_trait;
use tracing::debug;

use super::Scorer;
use super::error::ScoreError;
use super::types::{SweAnswer, VerificationSpec};
use crate::constants::DIFF_CONTEXT_LINES;
use crate::diff::{self, similarity};
use crate::extract::extract_last_generic_code_block;

#[derive(Debug, Clone, Copy, Default)]
pub struct SweScorer;

impl SweScorer {
    pub fn check(&self, llm_output: &str, input: &str, ground_truth: &str) -> f64 {
        let Some(prediction) = extract_last_generic_code_block(llm_output)
            .filter(|code| !code.is_empty())
        else {
            debug!("no fenced code block in output");
            return 0.0;
        };

        let input = input.trim();
        let oracle_diff = unified_diff(input, ground_truth.trim());
        let predicted_diff = unified_diff(input, prediction);

        if oracle_diff.is_empty() || predicted_diff.is_empty() {
            debug!(
                oracle_empty = oracle_diff.is_empty(),
                predicted_empty = predicted_diff.is_empty(),
                "empty diff"
            );
            return 0.0;
        }

        similarity(&predicted_diff, &oracle_diff)
    }
}

#[async_trait]
impl Scorer for SweScorer {
    async fn score(&self, llm_output: &str, spec: &VerificationSpec) -> Result<f64, ScoreError> {
        let answer: SweAnswer = spec.answer_as()?;
        Ok(self.check(llm_output, &answer.input, &answer.ground_truth))
    }
}

/// Line diff with the file header omitted; empty when both texts have the same lines.
pub fn unified_diff(before: &str, after: &str) -> String {
    diff::unified_diff(before, after, DIFF_CONTEXT_LINES)
}
