//! RL reward verifier library crate (used by the server binary and integration tests).
//!
//! # Public API Surface
//!
//! ## Scoring
//! - [`RewardEngine`] - routes a [`VerificationSpec`] to its scorer and blends in format
//! - [`VerifierRegistry`], [`VerifierSettings`] - lazily built per-type scorers
//! - [`ScoreError`], [`ErrorKind`] - error taxonomy shared by every scorer
//!
//! ## Service
//! - [`Config`] - `RLV_*` environment configuration
//! - [`gateway`] - `POST /reward` and `GET /ping`
//! - [`VerifierClient`] - typed client for a remote deployment
//!
//! ## Building blocks
//! - [`extract`] - boxed answers, fenced code, assistant turns
//! - [`diff`] - longest-matching-blocks similarity and unified line diffs
//! - [`math`], [`instructions`] - in-process equivalence and instruction checkers
//! - [`sandbox`] - remote code execution contract
//! - [`invoke`] - retry, failover and ordered batching

pub mod client;
pub mod config;
pub mod constants;
pub mod diff;
pub mod extract;
pub mod gateway;
pub mod instructions;
pub mod invoke;
pub mod math;
pub mod sandbox;
pub mod scoring;

pub use client::{ClientConfig, ClientError, VerificationInfo, VerifierClient};
pub use config::{Config, ConfigError};
pub use invoke::{BatchOptions, EndpointPool, RetryPolicy};
pub use scoring::{
    ErrorKind, FormatScorer, RewardEngine, ScoreError, TaskType, VerificationSpec,
    VerifierRegistry, VerifierSettings,
};
