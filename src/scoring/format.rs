//! Structural format compliance.
//!
//! Purely lexical: nothing here looks at whether the answer is right.

use async_trait::async_trait;
use tracing::debug;
use unicode_script::{Script, UnicodeScript};

use super::Scorer;
use super::error::ScoreError;
use super::types::{TaskType, VerificationSpec};
use crate::constants::{DEFAULT_EOS_TOKEN, THINK_CLOSE, THINK_OPEN};
use crate::extract::{extract_fenced_code, extract_last_boxed};

/// Binary format checker, shared by every request when enabled.
#[derive(Debug, Clone)]
pub struct FormatScorer {
    eos_token: String,
}

impl Default for FormatScorer {
    fn default() -> Self {
        Self::new(DEFAULT_EOS_TOKEN)
    }
}

impl FormatScorer {
    pub fn new(eos_token: impl Into<String>) -> Self {
        Self {
            eos_token: eos_token.into(),
        }
    }

    pub fn eos_token(&self) -> &str {
        &self.eos_token
    }

    /// Returns `1.0` when every structural check passes, `0.0` otherwise.
    pub fn check(&self, llm_output: &str, spec: &VerificationSpec) -> f64 {
        match self.first_violation(llm_output, spec) {
            Some(reason) => {
                debug!(reason, "format check failed");
                0.0
            }
            None => 1.0,
        }
    }

    fn first_violation(&self, llm_output: &str, spec: &VerificationSpec) -> Option<&'static str> {
        if contains_cjk(llm_output) {
            return Some("cjk_characters");
        }
        if !contains_thinking_block(llm_output) {
            return Some("missing_thinking_block");
        }
        if !llm_output.contains(self.eos_token.as_str()) {
            return Some("missing_eos_token");
        }
        match spec.task_type {
            TaskType::MathVerifiable if extract_last_boxed(llm_output).is_none() => {
                Some("missing_boxed_answer")
            }
            TaskType::CodeVerifiable
                if extract_fenced_code(llm_output, spec.code_language()).is_none() =>
            {
                Some("missing_code_block")
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Scorer for FormatScorer {
    async fn score(&self, llm_output: &str, spec: &VerificationSpec) -> Result<f64, ScoreError> {
        Ok(self.check(llm_output, spec))
    }
}

/// Any Han-script character counts, regardless of the prompt's language.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| c.script() == Script::Han)
}

/// A `<think>` that is later closed by `</think>`.
pub fn contains_thinking_block(text: &str) -> bool {
    text.find(THINK_OPEN)
        .is_some_and(|open| text[open + THINK_OPEN.len()..].contains(THINK_CLOSE))
}
