//! Resilient remote invocation.
//!
//! - [`retry`]: per-attempt timeout, bounded attempts, capped exponential backoff.
//! - [`endpoints`]: a pool of base URLs that fails over on connection errors.
//! - [`batch`]: ordered, bounded-concurrency fan-out where a failed item never aborts
//!   its siblings.

pub mod batch;
pub mod endpoints;
pub mod retry;


pub use batch::{BatchOptions, run_ordered};
pub use endpoints::EndpointPool;
pub use retry::{RetryPolicy, RetryState, Retryable, with_retry};
