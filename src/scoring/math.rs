use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Scorer;
use super::error::ScoreError;
use super::types::{ReferenceAnswer, VerificationSpec};
use crate::extract::extract_last_boxed;
use crate::math::{LatexMath, MathEquivalence};

/// Binary scorer: `1.0` iff the last boxed answer is equivalent to the reference.
#[derive(Clone)]
pub struct MathScorer {
    engine: Arc<dyn MathEquivalence>,
}

impl fmt::Debug for MathScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MathScorer").finish_non_exhaustive()
    }
}

impl Default for MathScorer {
    fn default() -> Self {
        Self::new(Arc::new(LatexMath))
    }
}

impl MathScorer {
    pub fn new(engine: Arc<dyn MathEquivalence>) -> Self {
        Self { engine }
    }

    /// Synchronous core of [`Scorer::score`]; the math backend never does I/O.
    pub fn check(&self, llm_output: &str, reference: &str) -> f64 {
        let Some(boxed) = extract_last_boxed(llm_output) else {
            debug!("no boxed answer in output");
            return 0.0;
        };

        let gold = self.engine.parse(&format!("\\boxed{{{reference}}}"));
        let prediction = self.engine.parse(boxed);

        match (gold, prediction) {
            (Some(gold), Some(prediction)) if self.engine.verify(&gold, &prediction) => 1.0,
            (None, _) => {
                debug!(reference, "reference answer did not parse");
                0.0
            }
            _ => 0.0,
        }
    }
}

#[async_trait]
impl Scorer for MathScorer {
    async fn score(&self, llm_output: &str, spec: &VerificationSpec) -> Result<f64, ScoreError> {
        let answer: ReferenceAnswer = spec.answer_as()?;
        Ok(self.check(llm_output, &answer.value))
    }
}
