//! Reward scoring.
//!
//! Every task type has one answer scorer producing a correctness score in `[0.0, 1.0]`.
//! The [`VerifierRegistry`] builds each of them lazily, the [`FormatScorer`] runs next to
//! it when enabled, and [`compose`] blends the two into the final reward.
//!
//! # Error Boundaries
//!
//! Scorers return `Result<f64, ScoreError>`. A score of `0.0` means "checked and wrong";
//! an error means "could not check". Only the outermost caller decides whether an error is
//! surfaced (the HTTP handler, [`RewardEngine::score`]) or replaced by a default
//! ([`RewardEngine::score_batch`], the client's safe APIs).

pub mod code;
pub mod compose;
pub mod engine;
pub mod error;
pub mod format;
pub mod instruction;
pub mod judge;
pub mod math;
pub mod registry;
pub mod swe;
pub mod types;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

pub use code::{CodeScorer, CodeSettings};
pub use compose::compose;
pub use engine::RewardEngine;
pub use error::{ErrorKind, ScoreError};
pub use format::FormatScorer;
pub use instruction::InstructionScorer;
pub use judge::{JudgeScorer, JudgeSettings};
pub use math::MathScorer;
pub use registry::{VerifierRegistry, VerifierSettings};
pub use swe::SweScorer;
pub use types::{TaskType, VerificationSpec};

/// One scoring strategy.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Scores `llm_output` against `spec`.
    async fn score(&self, llm_output: &str, spec: &VerificationSpec) -> Result<f64, ScoreError>;
}

/// Closed set of answer scorers, one variant per [`TaskType`].
#[derive(Debug)]
pub enum AnswerScorer {
    Math(MathScorer),
    Code(CodeScorer),
    Swe(SweScorer),
    Judge(JudgeScorer),
    InstructionFollowing(InstructionScorer),
}

impl AnswerScorer {
    pub fn task_type(&self) -> TaskType {
        match self {
            AnswerScorer::Math(_) => TaskType::MathVerifiable,
            AnswerScorer::Code(_) => TaskType::CodeVerifiable,
            AnswerScorer::Swe(_) => TaskType::SweVerifiable,
            AnswerScorer::Judge(_) => TaskType::LlmJudge,
            AnswerScorer::InstructionFollowing(_) => TaskType::InstructionFollowing,
        }
    }
}

#[async_trait]
impl Scorer for AnswerScorer {
    async fn score(&self, llm_output: &str, spec: &VerificationSpec) -> Result<f64, ScoreError> {
        let score = match self {
            AnswerScorer::Math(scorer) => scorer.score(llm_output, spec).await,
            AnswerScorer::Code(scorer) => scorer.score(llm_output, spec).await,
            AnswerScorer::Swe(scorer) => scorer.score(llm_output, spec).await,
            AnswerScorer::Judge(scorer) => scorer.score(llm_output, spec).await,
            AnswerScorer::InstructionFollowing(scorer) => scorer.score(llm_output, spec).await,
        }?;
        Ok(crate::constants::clamp_score(score))
    }
}
