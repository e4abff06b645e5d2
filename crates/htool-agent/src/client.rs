//! Agent client: timeout, retry and cancellation around a backend
//!
//! Key design: each invocation is stateless. Transient failures and
//! timed-out attempts are retried with linear backoff; rejections fail
//! at once. Cancellation wins over everything, including backoff sleeps.

use htool_core::config::{AgentConfig, BackendKind};
use htool_core::{AgentReply, HtoolError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::anthropic::AnthropicBackend;
use crate::backend::{AgentBackend, BackendFailure};
use crate::command::CommandBackend;
use crate::prompt::AgentPrompt;

/// Timeout and retry bounds for agent calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound for a single attempt
    pub timeout: Duration,
    /// Additional attempts after a transient failure
    pub max_retries: u32,
    /// Backoff step; the wait before attempt `n + 1` is `backoff * n`
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Total number of attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// Why the last attempt did not produce a reply
enum AttemptFailure {
    TimedOut,
    Transient(String),
}

/// Client for the agent collaborator
#[derive(Clone)]
pub struct AgentClient {
    backend: Arc<dyn AgentBackend>,
    policy: RetryPolicy,
}

impl AgentClient {
    pub fn new(backend: Arc<dyn AgentBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Build the configured backend and policy
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let backend: Arc<dyn AgentBackend> = match config.backend {
            BackendKind::Command => Arc::new(CommandBackend::from_config(&config.command)),
            BackendKind::Anthropic => Arc::new(AnthropicBackend::from_config(&config.anthropic)?),
        };
        Ok(Self::new(backend, RetryPolicy::from_config(config)))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Send the prompt and return the raw reply
    ///
    /// # Errors
    ///
    /// - [`HtoolError::Cancelled`] when `cancel` fires; any partial reply is dropped
    /// - [`HtoolError::AgentInvocation`] on rejection or when transient failures exhaust the retries
    /// - [`HtoolError::AgentTimeout`] when the final attempt timed out
    pub async fn invoke(
        &self,
        prompt: &AgentPrompt,
        cancel: &CancellationToken,
    ) -> Result<AgentReply> {
        let max_attempts = self.policy.max_attempts();
        let mut last_failure = AttemptFailure::Transient("no attempt made".to_string());

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(HtoolError::Cancelled);
            }

            debug!(
                "Invoking agent '{}' (attempt {}/{})",
                self.backend.name(),
                attempt,
                max_attempts
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Agent call cancelled during attempt {}", attempt);
                    return Err(HtoolError::Cancelled);
                }
                outcome = tokio::time::timeout(self.policy.timeout, self.backend.complete(prompt)) => outcome,
            };

            match outcome {
                Ok(Ok(text)) => {
                    info!(
                        "Agent replied on attempt {} ({} chars)",
                        attempt,
                        text.len()
                    );
                    return Ok(AgentReply::new(text, attempt));
                }
                Ok(Err(BackendFailure::Rejected(reason))) => {
                    warn!("Agent rejected the request: {}", reason);
                    return Err(HtoolError::AgentInvocation(reason));
                }
                Ok(Err(BackendFailure::Transient(reason))) => {
                    warn!(
                        "Transient agent failure (attempt {}/{}): {}",
                        attempt, max_attempts, reason
                    );
                    last_failure = AttemptFailure::Transient(reason);
                }
                Err(_elapsed) => {
                    warn!(
                        "Agent attempt {}/{} timed out after {:?}",
                        attempt, max_attempts, self.policy.timeout
                    );
                    last_failure = AttemptFailure::TimedOut;
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.backoff_for(attempt);
                debug!("Waiting {:?} before retry", delay);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(HtoolError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(match last_failure {
            AttemptFailure::TimedOut => HtoolError::AgentTimeout {
                attempts: max_attempts,
                timeout_secs: self.policy.timeout.as_secs(),
            },
            AttemptFailure::Transient(reason) => HtoolError::AgentInvocation(format!(
                "gave up after {} attempts: {}",
                max_attempts, reason
            )),
        })
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .finish()
    }
}
