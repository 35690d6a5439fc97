use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Error classification consulted by [`with_retry`].
pub trait Retryable: Sized {
    /// Connection failures and timeouts; anything else propagates at once.
    fn is_retryable(&self) -> bool;

    /// Failures where a different endpoint might succeed.
    fn is_connection_failure(&self) -> bool;

    /// Error reported when an attempt exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. `0` is treated as `1`.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Upper bound on a single attempt. `None` waits indefinitely.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// Single attempt with the given timeout.
    pub fn once(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout: Some(attempt_timeout),
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after failed attempt `attempt` (1-based): `initial * multiplier^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

/// States of one retried call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Attempting { attempt: u32 },
    Backoff { attempt: u32, delay: Duration },
    Exhausted { attempts: u32 },
}

impl RetryState {
    /// Transition taken when the current attempt failed.
    ///
    /// Non-retryable failures and the last permitted attempt both end in `Exhausted`.
    pub fn on_failure(self, policy: &RetryPolicy, retryable: bool) -> RetryState {
        match self {
            RetryState::Attempting { attempt } if retryable && attempt < policy.attempts() => {
                RetryState::Backoff {
                    attempt,
                    delay: policy.delay_for(attempt),
                }
            }
            RetryState::Attempting { attempt } => RetryState::Exhausted { attempts: attempt },
            other => other,
        }
    }

    /// Transition taken when there is nothing to wait for.
    pub fn advance(self) -> RetryState {
        match self {
            RetryState::Idle => RetryState::Attempting { attempt: 1 },
            RetryState::Backoff { attempt, .. } => RetryState::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }
}

/// Runs `op` under `policy`, passing the 1-based attempt number.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut state = RetryState::Idle;

    loop {
        state = state.advance();
        let RetryState::Attempting { attempt } = state else {
            continue;
        };

        let result = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(limit)),
            },
            None => op(attempt).await,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        state = state.on_failure(policy, error.is_retryable());
        match state {
            RetryState::Backoff { attempt, delay } => {
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            RetryState::Exhausted { attempts } => {
                debug!(attempts, error = %error, "giving up");
                return Err(error);
            }
            RetryState::Idle | RetryState::Attempting { .. } => return Err(error),
        }
    }
}
