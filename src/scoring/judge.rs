//! Correctness delegated to an OpenAI-compatible chat model.
//!
//! The model sees the response and the reference answer in one user message and must
//! reply `True` or `False`. Construction checks credentials and that the configured
//! model is listed by `GET {base}/models`, so a misconfigured judge fails at first use
//! rather than scoring every rollout as wrong.

use std::env;
use std::time::Duration;

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::Scorer;
use super::error::ScoreError;
use super::types::{ReferenceAnswer, TaskType, VerificationSpec};
use crate::invoke::{RetryPolicy, Retryable, with_retry};

pub const DEFAULT_JUDGE_BASE_URL: &str = "https://api.openai.com/v1";

/// Consulted when no API key is configured explicitly.
pub const FALLBACK_API_KEY_ENV: &str = "OPENAI_API_KEY";

const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);
const SERVICE: &str = "judge";

#[derive(Debug, Clone, PartialEq)]
pub struct JudgeSettings {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Timeout of one chat-completion attempt.
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            base_url: None,
            api_key: None,
            max_tokens: 100,
            temperature: 0.0,
            timeout: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum JudgeError {
    #[error("failed to connect to judge: {0}")]
    Connection(String),

    #[error("judge request timed out: {0}")]
    Timeout(String),

    #[error("judge returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed judge response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for JudgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            JudgeError::Timeout(e.to_string())
        } else if e.is_decode() {
            JudgeError::Decode(e.to_string())
        } else {
            JudgeError::Connection(e.to_string())
        }
    }
}

impl Retryable for JudgeError {
    fn is_retryable(&self) -> bool {
        matches!(self, JudgeError::Connection(_) | JudgeError::Timeout(_))
    }

    fn is_connection_failure(&self) -> bool {
        matches!(self, JudgeError::Connection(_))
    }

    fn timed_out(after: Duration) -> Self {
        JudgeError::Timeout(format!("no response within {}s", after.as_secs_f64()))
    }
}

impl From<JudgeError> for ScoreError {
    fn from(e: JudgeError) -> Self {
        match e {
            JudgeError::Connection(_) | JudgeError::Timeout(_) => ScoreError::Transport {
                service: SERVICE,
                reason: e.to_string(),
            },
            JudgeError::Status { .. } | JudgeError::Decode(_) => ScoreError::Verification {
                service: SERVICE,
                reason: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

pub struct JudgeScorer {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    policy: RetryPolicy,
}

impl std::fmt::Debug for JudgeScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeScorer")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl JudgeScorer {
    /// Resolves credentials and checks that the model is served.
    pub async fn connect(settings: &JudgeSettings) -> Result<Self, ScoreError> {
        let fail = |reason: String| ScoreError::initialization(TaskType::LlmJudge, reason);

        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env::var(FALLBACK_API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| fail(format!("{FALLBACK_API_KEY_ENV} is not set for the judge")))?;

        let model = settings.model.trim();
        if model.is_empty() {
            return Err(fail("no judge model configured".to_string()));
        }

        let base_url = settings
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_JUDGE_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let scorer = Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            model: model.to_string(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            policy: RetryPolicy::default()
                .with_max_attempts(settings.max_attempts)
                .with_attempt_timeout(settings.timeout),
        };

        let available = scorer.list_models().await.map_err(fail)?;
        if !available.iter().any(|id| id == &scorer.model) {
            return Err(fail(format!(
                "model {} is not available at {}",
                scorer.model, scorer.base_url
            )));
        }

        info!(model = %scorer.model, base_url = %scorer.base_url, "judge verifier ready");
        Ok(scorer)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>, String> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(CATALOG_TIMEOUT)
            .send()
            .await
            .map_err(|e| format!("failed to reach model catalog at {}: {}", self.base_url, e))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                Err(format!("authentication failed: {body}"))
            }
            status if !status.is_success() => Err(format!("model catalog returned HTTP {status}")),
            _ => response
                .json::<ModelList>()
                .await
                .map(|list| list.data.into_iter().map(|m| m.id).collect())
                .map_err(|e| format!("malformed model catalog: {e}")),
        }
    }

    // Older OpenAI-compatible servers ignore `max_completion_tokens`.
    #[allow(deprecated)]
    fn build_request(&self, llm_output: &str, reference: &str) -> Result<CreateChatCompletionRequest, ScoreError> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(judge_prompt(llm_output, reference))
            .build()
            .map_err(|e| ScoreError::Unexpected(e.to_string()))?;

        CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages([ChatCompletionRequestMessage::User(message)])
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()
            .map_err(|e| ScoreError::Unexpected(e.to_string()))
    }

    async fn complete(&self, request: &CreateChatCompletionRequest) -> Result<String, JudgeError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CreateChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::Decode(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| JudgeError::Decode("response has no message content".to_string()))
    }
}

#[async_trait]
impl Scorer for JudgeScorer {
    async fn score(&self, llm_output: &str, spec: &VerificationSpec) -> Result<f64, ScoreError> {
        let answer: ReferenceAnswer = spec.answer_as()?;
        let request = self.build_request(llm_output, &answer.value)?;

        let reply = with_retry(&self.policy, |_| self.complete(&request)).await?;
        let verdict = is_affirmative(&reply);
        debug!(reply = %reply.trim(), verdict, "judge replied");

        Ok(if verdict { 1.0 } else { 0.0 })
    }
}

/// Single user message comparing a response with its reference answer.
pub fn judge_prompt(model_response: &str, ground_truth: &str) -> String {
    format!(
        "<Model Response>\n{model_response}\n</Model Response>\n\n\
         <Reference Answer>\n{ground_truth}\n</Reference Answer>\n\n\
         You are provided with a model-generated response (<Model Response>) and a reference \
         answer (<Reference Answer>). Compare the model response with the reference answer and \
         determine its correctness. Your task is to simply output \"True\" if the response is \
         correct, and \"False\" otherwise"
    )
}

/// `true` iff the reply, trimmed, unquoted and lower-cased, is exactly `true`.
///
/// Whitespace inside the quotes is not trimmed.
pub fn is_affirmative(reply: &str) -> bool {
    reply.trim().trim_matches('"').eq_ignore_ascii_case("true")
}
