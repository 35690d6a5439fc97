use std::sync::Arc;

use tracing::{debug, instrument};

use super::compose::compose;
use super::error::ScoreError;
use super::format::FormatScorer;
use super::registry::{VerifierRegistry, VerifierSettings};
use super::types::VerificationSpec;
use super::Scorer;
use crate::invoke::{BatchOptions, run_ordered};

/// In-process reward computation: routing, answer scoring, format scoring, composition.
#[derive(Debug)]
pub struct RewardEngine {
    registry: VerifierRegistry,
    format: Option<FormatScorer>,
}

impl RewardEngine {
    /// `format` is the shared format scorer; `None` disables format blending.
    pub fn new(settings: VerifierSettings, format: Option<FormatScorer>) -> Self {
        Self::with_registry(VerifierRegistry::new(settings), format)
    }

    pub fn with_registry(registry: VerifierRegistry, format: Option<FormatScorer>) -> Self {
        Self { registry, format }
    }

    pub fn registry(&self) -> &VerifierRegistry {
        &self.registry
    }

    pub fn format_enabled(&self) -> bool {
        self.format.is_some()
    }

    /// Composed reward for one output.
    #[instrument(skip_all, fields(task_type = %spec.task_type))]
    pub async fn score(&self, llm_output: &str, spec: &VerificationSpec) -> Result<f64, ScoreError> {
        let scorer = self.registry.route(spec.task_type).await?;

        let reward = match &self.format {
            Some(format) => {
                let (answer, format) =
                    tokio::join!(scorer.score(llm_output, spec), format.score(llm_output, spec));
                let (answer, format) = (answer?, format?);
                debug!(answer, format, "scored");
                compose(answer, Some(format))
            }
            None => {
                let answer = scorer.score(llm_output, spec).await?;
                debug!(answer, "scored");
                compose(answer, None)
            }
        };

        Ok(reward)
    }

    /// Same as [`score`](Self::score) for a JSON-encoded spec.
    pub async fn score_json(&self, llm_output: &str, verification_info: &str) -> Result<f64, ScoreError> {
        let spec = VerificationSpec::from_json(verification_info)?;
        self.score(llm_output, &spec).await
    }

    /// Scores every pair with bounded concurrency. Never fails: an item whose scoring
    /// errors (or panics) gets `options.default`. Output order matches input order.
    pub async fn score_batch(
        self: Arc<Self>,
        batch: Vec<(String, VerificationSpec)>,
        options: BatchOptions<f64>,
    ) -> Vec<f64> {
        run_ordered(batch, options, move |(llm_output, spec)| {
            let engine = Arc::clone(&self);
            async move { engine.score(&llm_output, &spec).await }
        })
        .await
    }
}
