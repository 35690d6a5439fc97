use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Scorer;
use super::error::ScoreError;
use super::types::{InstructionAnswer, VerificationSpec};
use crate::instructions::{BuiltinChecker, InstructionChecker};

/// Fractional scorer: share of instructions the response follows.
#[derive(Clone)]
pub struct InstructionScorer {
    checker: Arc<dyn InstructionChecker>,
}

impl fmt::Debug for InstructionScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionScorer").finish_non_exhaustive()
    }
}

impl Default for InstructionScorer {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinChecker))
    }
}

impl InstructionScorer {
    pub fn new(checker: Arc<dyn InstructionChecker>) -> Self {
        Self { checker }
    }

    pub fn check(&self, llm_output: &str, answer: &InstructionAnswer) -> Result<f64, ScoreError> {
        if answer.instruction_id_list.is_empty() {
            return Err(ScoreError::validation(
                "instruction_id_list must contain at least one instruction",
            ));
        }

        let verdicts = self
            .checker
            .check(
                &answer.prompt,
                &answer.instruction_id_list,
                &answer.kwargs,
                llm_output,
            )
            .map_err(|e| ScoreError::validation(e.to_string()))?;

        let followed = verdicts.iter().filter(|v| **v).count();
        debug!(followed, total = verdicts.len(), "instructions checked");

        Ok(followed as f64 / verdicts.len().max(1) as f64)
    }
}

#[async_trait]
impl Scorer for InstructionScorer {
    async fn score(&self, llm_output: &str, spec: &VerificationSpec) -> Result<f64, ScoreError> {
        let answer: InstructionAnswer = spec.answer_as()?;
        self.check(llm_output, &answer)
    }
}
