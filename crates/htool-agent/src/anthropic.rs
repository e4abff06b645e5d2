//! Anthropic Messages API backend
//!
//! Each request is a single stateless user message. Retry decisions are
//! left to the caller: this backend only classifies failures.

use async_trait::async_trait;
use htool_core::config::AnthropicConfig;

use crate::auth;
use crate::backend::{AgentBackend, BackendFailure};
use crate::prompt::AgentPrompt;
use crate::types::{AnthropicMessage, AnthropicRequest, AnthropicResponse, ModelId};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: usize = 16000;

/// Backend calling the Anthropic API over HTTPS
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    client: reqwest::Client,
    model: ModelId,
    max_tokens: usize,
}

impl AnthropicBackend {
    pub fn new(model: ModelId) -> Self {
        Self {
            client: reqwest::Client::new(),
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn from_config(config: &AnthropicConfig) -> htool_core::Result<Self> {
        let model: ModelId = config
            .model
            .parse()
            .map_err(htool_core::HtoolError::Config)?;
        Ok(Self::new(model).with_max_tokens(config.max_tokens))
    }

    /// Set max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &ModelId {
        &self.model
    }
}

/// Whether an HTTP status is worth another attempt
fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

#[async_trait]
impl AgentBackend for AnthropicBackend {
    async fn complete(&self, prompt: &AgentPrompt) -> Result<String, BackendFailure> {
        let auth_token = auth::get_auth_token()?;

        let request = AnthropicRequest {
            model: self.model.to_string(),
            max_tokens: self.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.text.clone(),
            }],
        };

        tracing::debug!("Sending request to Anthropic API with model {}", self.model);

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &auth_token)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendFailure::Transient(format!("Failed to send request: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            let message = format!("Anthropic API error {}: {}", status, error_text);

            return if is_retryable_status(status.as_u16()) {
                Err(BackendFailure::Transient(message))
            } else {
                Err(BackendFailure::Rejected(message))
            };
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| BackendFailure::Rejected(format!("Failed to parse response: {}", e)))?;

        if let Some(ref usage) = anthropic_response.usage {
            tracing::info!(
                "Anthropic reply received ({} input tokens, {} output tokens)",
                usage.input_tokens,
                usage.output_tokens
            );
        }

        let output = anthropic_response.text();
        if output.is_empty() {
            return Err(BackendFailure::Rejected(
                "No text content in response".to_string(),
            ));
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
