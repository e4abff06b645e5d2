//! The agent collaborator seam
//!
//! A backend takes a prompt and returns the agent's unstructured reply text.
//! It reports whether a failure is worth retrying; the retry, timeout and
//! cancellation policy lives in [`AgentClient`](crate::AgentClient).

use async_trait::async_trait;
use thiserror::Error;

use crate::prompt::AgentPrompt;

/// Failure reported by a single backend call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendFailure {
    /// Network hiccup, rate limit, temporary unavailability
    #[error("transient failure: {0}")]
    Transient(String),

    /// The request itself was refused or malformed; retrying will not help
    #[error("rejected: {0}")]
    Rejected(String),
}

impl BackendFailure {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Trait for agent backends (allows stubbing in tests)
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Send one prompt and return the raw reply text, unmodified
    async fn complete(&self, prompt: &AgentPrompt) -> Result<String, BackendFailure>;

    /// Short name used in logs
    fn name(&self) -> &str;
}
