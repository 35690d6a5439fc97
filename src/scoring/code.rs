//! Test-case pass rate from remote sandboxed execution.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use tracing::{debug, info, warn};

use super::Scorer;
use super::error::ScoreError;
use super::types::{CodeAnswer, TaskType, VerificationSpec};
use crate::extract::extract_fenced_code;
use crate::invoke::RetryPolicy;
use crate::sandbox::{SandboxClient, SubmitRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct CodeSettings {
    /// Sandbox base URL. Empty means "not configured".
    pub base_url: String,
    /// Timeout of one submission attempt.
    pub timeout: Duration,
    pub max_attempts: u32,
    /// Submissions in flight per scored output.
    pub concurrency: usize,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            max_attempts: 1,
            concurrency: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodeScorer {
    client: SandboxClient,
    concurrency: usize,
}

impl CodeScorer {
    /// Builds the scorer and probes the sandbox once.
    pub async fn connect(settings: &CodeSettings) -> Result<Self, ScoreError> {
        let policy = RetryPolicy::once(settings.timeout).with_max_attempts(settings.max_attempts);
        let client = SandboxClient::new(&settings.base_url, policy)
            .map_err(|e| ScoreError::initialization(TaskType::CodeVerifiable, e.to_string()))?;

        client.ping().await.map_err(|e| {
            ScoreError::initialization(
                TaskType::CodeVerifiable,
                format!("failed to connect to sandbox at '{}': {}", client.base_url(), e),
            )
        })?;

        info!(base_url = client.base_url(), "code verifier ready");
        Ok(Self::with_client(client, settings.concurrency))
    }

    /// Builds the scorer around an existing client without probing it.
    pub fn with_client(client: SandboxClient, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn check(&self, llm_output: &str, answer: &CodeAnswer) -> Result<f64, ScoreError> {
        if answer.test_cases.is_empty() {
            return Err(ScoreError::validation("test_cases must not be empty"));
        }

        let language = answer.language();
        let Some(code) = extract_fenced_code(llm_output, language) else {
            debug!(language, "no matching code block in output");
            return Ok(0.0);
        };
        let completion = format!("```{language}\n{code}```");

        let requests: Vec<SubmitRequest> = answer
            .test_cases
            .iter()
            .enumerate()
            .map(|(id, case)| SubmitRequest::for_test_case(id, completion.clone(), language, case))
            .collect();
        let total = requests.len();

        let client = &self.client;
        let outcomes: Vec<bool> = stream::iter(requests)
            .map(|request| async move {
                match client.submit(&request).await {
                    Ok(response) => response.first_test_passed(),
                    Err(e) => {
                        warn!(test_case = request.id, error = %e, "test case errored, counting as failed");
                        false
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        let passed = outcomes.into_iter().filter(|passed| *passed).count();

        debug!(passed, total, "code test cases evaluated");
        Ok(passed as f64 / total as f64)
    }
}

#[async_trait]
impl Scorer for CodeScorer {
    async fn score(&self, llm_output: &str, spec: &VerificationSpec) -> Result<f64, ScoreError> {
        let answer: CodeAnswer = spec.answer_as()?;
        self.check(llm_output, &answer).await
    }
}
