//! # htool-core
//!
//! Core types for html-tool, the command-line generator that turns a
//! natural-language description into a single-file HTML tool.
//!
//! ## Pipeline
//!
//! Every invocation runs one stateless, linear pipeline:
//!
//! - Build a [`GenerationRequest`] from the command line
//! - Ask the agent collaborator for a reply ([`AgentReply`])
//! - Extract exactly one [`Artifact`] from the reply
//! - Resolve a [`ResolvedTarget`] path and write it atomically
//! - Optionally open the result in the default viewer
//!
//! The run ends with a [`GenerationResult`] that the CLI maps to an exit code.

pub mod config;
mod error;
mod request;
mod types;

pub use config::HtoolConfig;
pub use error::{ErrorKind, HtoolError, Result};
pub use request::{GenerationRequest, RequestBuilder};
pub use types::*;
