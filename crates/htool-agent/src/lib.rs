//! # htool-agent
//!
//! Client for the external agent collaborator that writes the HTML tool.
//!
//! The collaborator is a black box: a prompt goes in, unstructured text
//! comes out. Two backends are provided:
//! - [`CommandBackend`]: spawns an agent program (default `amplifier`)
//! - [`AnthropicBackend`]: calls the Anthropic Messages API
//!
//! [`AgentClient`] wraps a backend with a per-attempt timeout, bounded
//! retries with linear backoff for transient failures, and prompt
//! cancellation through a [`CancellationToken`](tokio_util::sync::CancellationToken).

mod anthropic;
mod auth;
mod backend;
mod client;
mod command;
mod prompt;
pub mod testing;
mod types;

pub use anthropic::AnthropicBackend;
pub use auth::{get_auth_token, AUTH_ENV_VARS};
pub use backend::{AgentBackend, BackendFailure};
pub use client::{AgentClient, RetryPolicy};
pub use command::CommandBackend;
pub use prompt::{output_instructions, AgentPrompt};
pub use types::*;
