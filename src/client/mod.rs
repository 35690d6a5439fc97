//! Typed client for a remote reward service.
//!
//! Requests go to one of several equivalent replicas; a replica that refuses
//! connections is skipped on the next attempt. Single calls return [`ClientError`];
//! [`VerifierClient::verify_safe`] and [`VerifierClient::verify_batch`] never fail and
//! substitute the caller's default instead.

mod error;


pub use error::ClientError;

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::gateway::{PingResponse, RewardRequest, RewardResponse};
use crate::invoke::{BatchOptions, EndpointPool, RetryPolicy, run_ordered};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URLs of equivalent verifier replicas.
    pub endpoints: Vec<String>,
    /// Timeout of one `/reward` attempt.
    pub timeout: Duration,
    /// Timeout of the `/ping` probe sent to each endpoint on connect.
    pub ping_timeout: Duration,
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub initial_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            timeout: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(5),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl ClientConfig {
    pub fn new(endpoints: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_initial_delay(self.initial_backoff)
            .with_attempt_timeout(self.timeout)
    }
}

/// Verification info as sent to the service: a JSON string or an already-structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationInfo {
    Json(String),
    Value(Value),
}

impl VerificationInfo {
    /// JSON text for the wire. Strings must parse; values must be objects.
    pub fn to_json_string(&self) -> Result<String, ClientError> {
        match self {
            VerificationInfo::Json(raw) => serde_json::from_str::<Value>(raw)
                .map(|_| raw.clone())
                .map_err(|_| {
                    ClientError::Validation("the provided string is not valid JSON".to_string())
                }),
            VerificationInfo::Value(value @ Value::Object(_)) => Ok(value.to_string()),
            VerificationInfo::Value(_) => Err(ClientError::Validation(
                "verification info must be a JSON object".to_string(),
            )),
        }
    }
}

impl From<String> for VerificationInfo {
    fn from(raw: String) -> Self {
        VerificationInfo::Json(raw)
    }
}

impl From<&str> for VerificationInfo {
    fn from(raw: &str) -> Self {
        VerificationInfo::Json(raw.to_string())
    }
}

impl From<Value> for VerificationInfo {
    fn from(value: Value) -> Self {
        VerificationInfo::Value(value)
    }
}

/// Cheap to clone; clones share the connection pool and endpoint rotation.
#[derive(Debug, Clone)]
pub struct VerifierClient {
    http: reqwest::Client,
    pool: Arc<EndpointPool>,
    policy: RetryPolicy,
}

impl VerifierClient {
    /// Builds the client and pings every endpoint; any unreachable endpoint is an error.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let pool =
            EndpointPool::new(config.endpoints.iter().cloned()).ok_or(ClientError::NoEndpoints)?;
        let http = reqwest::Client::new();

        for endpoint in pool.endpoints() {
            ping(&http, endpoint, config.ping_timeout).await?;
        }
        info!(endpoints = pool.len(), "verifier client connected");

        Ok(Self {
            http,
            pool: Arc::new(pool),
            policy: config.retry_policy(),
        })
    }

    pub fn endpoints(&self) -> &[String] {
        self.pool.endpoints()
    }

    /// Reward for one output.
    #[instrument(skip_all)]
    pub async fn verify(
        &self,
        llm_output: &str,
        verification_info: impl Into<VerificationInfo>,
    ) -> Result<f64, ClientError> {
        let request = RewardRequest {
            llm_output: llm_output.to_string(),
            verification_info: verification_info.into().to_json_string()?,
        };

        let score = self
            .pool
            .call(&self.policy, |endpoint| self.post_reward(endpoint, &request))
            .await?;
        debug!(score, "reward received");
        Ok(score)
    }

    /// Same as [`verify`](Self::verify), returning `default` on any failure.
    pub async fn verify_safe(
        &self,
        llm_output: &str,
        verification_info: impl Into<VerificationInfo>,
        default: f64,
    ) -> f64 {
        match self.verify(llm_output, verification_info).await {
            Ok(score) => score,
            Err(e) => {
                warn!(error = %e, default, "verification error, returning default");
                default
            }
        }
    }

    /// Rewards for many outputs with at most `max_workers` requests in flight.
    ///
    /// One score per input, in input order; failed items get `default`.
    pub async fn verify_batch(
        &self,
        batch: Vec<(String, VerificationInfo)>,
        max_workers: usize,
        default: f64,
        show_progress: bool,
    ) -> Vec<f64> {
        let client = self.clone();
        let options = BatchOptions::new(max_workers, default).show_progress(show_progress);

        run_ordered(batch, options, move |(llm_output, info)| {
            let client = client.clone();
            async move { client.verify(&llm_output, info).await }
        })
        .await
    }

    async fn post_reward(
        &self,
        endpoint: String,
        request: &RewardRequest,
    ) -> Result<f64, ClientError> {
        let response = self
            .http
            .post(format!("{endpoint}/reward"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation(body),
                StatusCode::BAD_REQUEST => ClientError::Verification(body),
                _ => ClientError::Server {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<RewardResponse>(&body)
            .map(|reward| reward.score)
            .map_err(|_| ClientError::Server {
                status: status.as_u16(),
                body: format!("failed to parse response as JSON: {body}"),
            })
    }
}

async fn ping(http: &reqwest::Client, endpoint: &str, timeout: Duration) -> Result<(), ClientError> {
    let response = http
        .get(format!("{endpoint}/ping"))
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ClientError::Connection(format!("failed to connect {endpoint}: {e}")))?;

    if response.status() != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Connection(format!(
            "failed to connect {endpoint}: {body}"
        )));
    }

    if let Ok(pong) = response.json::<PingResponse>().await {
        debug!(endpoint, status = %pong.status, "endpoint alive");
    }
    Ok(())
}
