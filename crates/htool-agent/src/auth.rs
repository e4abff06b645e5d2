//! Credentials for the Anthropic backend
//!
//! Two sources are checked, in order:
//! 1. `CLAUDE_CODE_OAUTH_TOKEN`
//! 2. `ANTHROPIC_API_KEY`

use std::env;

use crate::backend::BackendFailure;

/// Environment variables consulted for a credential, highest priority first
pub const AUTH_ENV_VARS: &[&str] = &["CLAUDE_CODE_OAUTH_TOKEN", "ANTHROPIC_API_KEY"];

/// Get the credential for the Anthropic API
///
/// Missing credentials are a rejection: retrying cannot fix them.
pub fn get_auth_token() -> Result<String, BackendFailure> {
    token_from(|var| env::var(var).ok())
}

/// First non-blank credential reported by `lookup`, in [`AUTH_ENV_VARS`] order
fn token_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String, BackendFailure> {
    AUTH_ENV_VARS
        .iter()
        .find_map(|var| {
            let token = lookup(*var).filter(|t| !t.trim().is_empty())?;
            tracing::debug!("Using credential from {}", var);
            Some(token)
        })
        .ok_or_else(|| {
            BackendFailure::Rejected(
                "No authentication found. Set either:\n\
                 - CLAUDE_CODE_OAUTH_TOKEN=sk-ant-oat01-... (for subscription access)\n\
                 - ANTHROPIC_API_KEY=sk-ant-api03-...       (for API access)"
                    .to_string(),
            )
        })
}
