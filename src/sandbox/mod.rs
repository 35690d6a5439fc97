//! Client for a SandboxFusion-compatible remote execution service.
//!
//! Two endpoints are used: `GET {base}/v1/ping` as a liveness probe and
//! `POST {base}/submit` to run one completion against provided test data.

pub mod error;
pub mod types;

use std::time::Duration;

use tracing::{debug, instrument};

pub use error::SandboxError;
pub use types::{SubmitRequest, SubmitResponse, TestOutcome};

use crate::invoke::{RetryPolicy, with_retry};

/// Timeout of the liveness probe.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SandboxClient {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl SandboxClient {
    pub fn new(base_url: &str, policy: RetryPolicy) -> Result<Self, SandboxError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(SandboxError::EmptyBaseUrl);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn ping(&self) -> Result<(), SandboxError> {
        let response = self
            .http
            .get(format!("{}/v1/ping", self.base_url))
            .timeout(PING_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SandboxError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!("sandbox is alive");
        Ok(())
    }

    /// Submits one request through the retry policy.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, SandboxError> {
        let url = format!("{}/submit", self.base_url);
        with_retry(&self.policy, |attempt| {
            debug!(id = request.id, attempt, "submitting to sandbox");
            self.submit_once(&url, request)
        })
        .await
    }

    async fn submit_once(
        &self,
        url: &str,
        request: &SubmitRequest,
    ) -> Result<SubmitResponse, SandboxError> {
        let response = self.http.post(url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SandboxError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<SubmitResponse>()
            .await
            .map_err(|e| SandboxError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::types::TestCase;

    #[test]
    fn test_empty_base_url_is_rejected() {
        assert!(matches!(
            SandboxClient::new("   ", RetryPolicy::default()),
            Err(SandboxError::EmptyBaseUrl)
        ));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = SandboxClient::new(" http://sandbox:8080/ ", RetryPolicy::default())
            .expect("client");
        assert_eq!(client.base_url(), "http://sandbox:8080");
    }

    #[test]
    fn test_submit_request_shape() {
        let case = TestCase {
            input: "1 2\n".to_string(),
            output: "3\n".to_string(),
        };
        let request = SubmitRequest::for_test_case(4, "```python\nprint(3)\n```".into(), "python", &case);
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["dataset"], "custom_dataset");
        assert_eq!(json["id"], 4);
        assert_eq!(json["config"]["dataset_type"], "CommonOJDataset");
        assert_eq!(json["config"]["language"], "python");
        assert_eq!(json["config"]["provided_data"]["id"], 4);
        assert_eq!(json["config"]["provided_data"]["test"][0]["input"]["stdin"], "1 2\n");
        assert_eq!(json["config"]["provided_data"]["test"][0]["output"]["stdout"], "3\n");
    }

    #[test]
    fn test_first_test_passed() {
        let response: SubmitResponse = serde_json::from_value(serde_json::json!({
            "id": 0,
            "accepted": false,
            "extracted_code": "print(1)",
            "tests": [{"passed": true, "exec_info": {"status": "Success"}}]
        }))
        .expect("deserialize");
        assert!(response.first_test_passed());

        let empty: SubmitResponse =
            serde_json::from_value(serde_json::json!({"tests": []})).expect("deserialize");
        assert!(!empty.first_test_passed());
    }
}
