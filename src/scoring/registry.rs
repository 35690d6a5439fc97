//! Lazily constructed answer scorers, one per task type.
//!
//! Backed by [`moka::future::Cache::try_get_with`]: concurrent first requests for a type
//! share one construction, its result is authoritative, and a failed construction is not
//! cached so a later request retries it.

use std::sync::Arc;

use moka::future::Cache;
use tracing::{debug, info, instrument};

use super::code::{CodeScorer, CodeSettings};
use super::error::ScoreError;
use super::instruction::InstructionScorer;
use super::judge::{JudgeScorer, JudgeSettings};
use super::math::MathScorer;
use super::swe::SweScorer;
use super::types::TaskType;
use super::AnswerScorer;

/// Everything needed to build any answer scorer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifierSettings {
    pub code: CodeSettings,
    pub judge: JudgeSettings,
}

pub struct VerifierRegistry {
    settings: VerifierSettings,
    scorers: Cache<TaskType, Arc<AnswerScorer>>,
}

impl std::fmt::Debug for VerifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierRegistry")
            .field("settings", &self.settings)
            .field("cached", &self.scorers.entry_count())
            .finish()
    }
}

impl VerifierRegistry {
    pub fn new(settings: VerifierSettings) -> Self {
        Self {
            settings,
            scorers: Cache::new(TaskType::ALL.len() as u64),
        }
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// Returns the scorer for `task_type`, constructing it on first use.
    #[instrument(skip(self))]
    pub async fn route(&self, task_type: TaskType) -> Result<Arc<AnswerScorer>, ScoreError> {
        self.scorers
            .try_get_with(task_type, async {
                debug!(%task_type, "constructing verifier");
                let scorer = self.build(task_type).await?;
                info!(%task_type, "verifier initialized");
                Ok::<_, ScoreError>(Arc::new(scorer))
            })
            .await
            .map_err(|e: Arc<ScoreError>| (*e).clone())
    }

    /// Scorer for `task_type` if it was already constructed.
    pub async fn cached(&self, task_type: TaskType) -> Option<Arc<AnswerScorer>> {
        self.scorers.get(&task_type).await
    }

    /// Inserts a pre-built scorer, replacing any cached one.
    pub async fn insert(&self, scorer: AnswerScorer) {
        self.scorers.insert(scorer.task_type(), Arc::new(scorer)).await;
    }

    async fn build(&self, task_type: TaskType) -> Result<AnswerScorer, ScoreError> {
        Ok(match task_type {
            TaskType::MathVerifiable => AnswerScorer::Math(MathScorer::default()),
            TaskType::CodeVerifiable => {
                AnswerScorer::Code(CodeScorer::connect(&self.settings.code).await?)
            }
            TaskType::SweVerifiable => AnswerScorer::Swe(SweScorer),
            TaskType::LlmJudge => AnswerScorer::Judge(JudgeScorer::connect(&self.settings.judge).await?),
            TaskType::InstructionFollowing => {
                AnswerScorer::InstructionFollowing(InstructionScorer::default())
            }
        })
    }
}
