//! External agent program backend
//!
//! Runs a command such as `amplifier run --agent html-tool-builder <description>`
//! and treats its stdout as the reply. The child is killed if the call is
//! dropped (timeout or cancellation), so no orphaned agent keeps running.

use async_trait::async_trait;
use htool_core::config::CommandConfig;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::backend::{AgentBackend, BackendFailure};
use crate::prompt::AgentPrompt;

const DESCRIPTION_PLACEHOLDER: &str = "{description}";
const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Backend that spawns an agent program per request
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    retryable_exit_codes: Vec<i32>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            retryable_exit_codes: Vec::new(),
        }
    }

    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
            .with_retryable_exit_codes(config.retryable_exit_codes.clone())
    }

    /// Exit codes that should be treated as transient
    pub fn with_retryable_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.retryable_exit_codes = codes;
        self
    }

    /// Arguments with placeholders replaced for `prompt`
    fn render_args(&self, prompt: &AgentPrompt) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace(DESCRIPTION_PLACEHOLDER, &prompt.description)
                    .replace(PROMPT_PLACEHOLDER, &prompt.text)
            })
            .collect()
    }
}

#[async_trait]
impl AgentBackend for CommandBackend {
    #[instrument(skip(self, prompt), fields(program = %self.program))]
    async fn complete(&self, prompt: &AgentPrompt) -> Result<String, BackendFailure> {
        let args = self.render_args(prompt);
        debug!("Executing {} with {} argument(s)", self.program, args.len());

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BackendFailure::Rejected(format!(
                    "Agent program '{}' not found. Install it first, e.g.:\n   \
                     uv tool install git+https://github.com/microsoft/amplifier",
                    self.program
                )),
                std::io::ErrorKind::PermissionDenied => BackendFailure::Rejected(format!(
                    "Agent program '{}' is not executable: {}",
                    self.program, e
                )),
                _ => BackendFailure::Transient(format!(
                    "Failed to run agent program '{}': {}",
                    self.program, e
                )),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if output.status.success() {
            debug!("Agent program returned {} bytes", stdout.len());
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = match output.status.code() {
            Some(code) => format!("'{}' exited with status {}: {}", self.program, code, stderr),
            None => format!("'{}' was terminated by a signal: {}", self.program, stderr),
        };

        match output.status.code() {
            Some(code) if self.retryable_exit_codes.contains(&code) => {
                Err(BackendFailure::Transient(message))
            }
            _ => Err(BackendFailure::Rejected(message)),
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}
