use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use tracing::warn;

use super::retry::{RetryPolicy, Retryable, with_retry};

/// Base URLs of equivalent replicas.
///
/// Calls go to the current endpoint; a connection failure moves the pool to the next
/// one so the retry lands elsewhere. The starting endpoint is random, which spreads
/// independent clients across replicas.
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<String>,
    current: AtomicUsize,
}

impl EndpointPool {
    /// Returns `None` for an empty list. Trailing slashes are removed.
    pub fn new(endpoints: impl IntoIterator<Item = impl Into<String>>) -> Option<Self> {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.into().trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return None;
        }
        let start = rand::thread_rng().gen_range(0..endpoints.len());
        Some(Self {
            endpoints,
            current: AtomicUsize::new(start),
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Index and URL of the endpoint the next call will use.
    pub fn current(&self) -> (usize, &str) {
        let index = self.current.load(Ordering::Acquire) % self.endpoints.len();
        (index, &self.endpoints[index])
    }

    /// Moves past `failed`. A no-op if another caller already moved the pool.
    pub fn fail_over(&self, failed: usize) {
        let next = (failed + 1) % self.endpoints.len();
        if self
            .current
            .compare_exchange(failed, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            && self.endpoints.len() > 1
        {
            warn!(
                from = self.endpoints[failed].as_str(),
                to = self.endpoints[next].as_str(),
                "endpoint unreachable, failing over"
            );
        }
    }

    /// Runs `op` against the current endpoint under `policy`, failing over on
    /// connection failures between attempts.
    pub async fn call<T, E, F, Fut>(&self, policy: &RetryPolicy, mut op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        with_retry(policy, |_attempt| {
            let (index, endpoint) = self.current();
            let request = op(endpoint.to_string());
            async move {
                let result = request.await;
                if let Err(e) = &result
                    && e.is_connection_failure()
                {
                    self.fail_over(index);
                }
                result
            }
        })
        .await
    }
}
