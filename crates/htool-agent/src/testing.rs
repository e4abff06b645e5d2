//! Scripted agent backend for tests
//!
//! [`StubBackend`] plays back a fixed sequence of outcomes, one per call,
//! and counts calls. Use it instead of ad-hoc backend impls in tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::backend::{AgentBackend, BackendFailure};
use crate::prompt::AgentPrompt;

/// Long enough to outlast any timeout used in tests
const HANG: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct StubStep {
    delay: Option<Duration>,
    outcome: Result<String, BackendFailure>,
}

/// A backend that replays scripted outcomes
#[derive(Debug, Default)]
pub struct StubBackend {
    script: Mutex<VecDeque<StubStep>>,
    fallback: Option<String>,
    call_count: AtomicU32,
}

impl StubBackend {
    /// An empty script; calls beyond the script are rejected
    pub fn new() -> Self {
        Self::default()
    }

    /// A stub that always replies with `text`
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::default()
        }
    }

    fn push(mut self, step: StubStep) -> Self {
        if let Ok(script) = self.script.get_mut() {
            script.push_back(step);
        }
        self
    }

    pub fn then_reply(self, text: impl Into<String>) -> Self {
        self.push(StubStep {
            delay: None,
            outcome: Ok(text.into()),
        })
    }

    pub fn then_reply_after(self, delay: Duration, text: impl Into<String>) -> Self {
        self.push(StubStep {
            delay: Some(delay),
            outcome: Ok(text.into()),
        })
    }

    pub fn then_transient(self, reason: impl Into<String>) -> Self {
        self.push(StubStep {
            delay: None,
            outcome: Err(BackendFailure::Transient(reason.into())),
        })
    }

    pub fn then_reject(self, reason: impl Into<String>) -> Self {
        self.push(StubStep {
            delay: None,
            outcome: Err(BackendFailure::Rejected(reason.into())),
        })
    }

    /// A call that does not return until cancelled or timed out
    pub fn then_hang(self) -> Self {
        self.push(StubStep {
            delay: Some(HANG),
            outcome: Err(BackendFailure::Transient("stub hang elapsed".to_string())),
        })
    }

    /// Number of calls received so far
    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> StubStep {
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        scripted.unwrap_or_else(|| StubStep {
            delay: None,
            outcome: self
                .fallback
                .clone()
                .ok_or_else(|| BackendFailure::Rejected("stub script exhausted".to_string())),
        })
    }
}

#[async_trait]
impl AgentBackend for StubBackend {
    async fn complete(&self, _prompt: &AgentPrompt) -> Result<String, BackendFailure> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();
        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }
        step.outcome
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_plays_in_order_then_rejects() {
        let stub = StubBackend::new().then_transient("x").then_reply("done");
        let prompt = AgentPrompt::from_description("t");

        assert!(matches!(
            stub.complete(&prompt).await,
            Err(BackendFailure::Transient(_))
        ));
        assert_eq!(stub.complete(&prompt).await.unwrap(), "done");
        assert!(matches!(
            stub.complete(&prompt).await,
            Err(BackendFailure::Rejected(_))
        ));
        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test]
    async fn test_replying_repeats() {
        let stub = StubBackend::replying("same");
        let prompt = AgentPrompt::from_description("t");
        assert_eq!(stub.complete(&prompt).await.unwrap(), "same");
        assert_eq!(stub.complete(&prompt).await.unwrap(), "same");
    }
}
