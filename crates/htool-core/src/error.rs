//! Unified error types for html-tool

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for every fatal pipeline failure
#[derive(Error, Debug)]
pub enum HtoolError {
    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // Agent errors
    #[error("Agent timed out after {attempts} attempt(s) of {timeout_secs}s each")]
    AgentTimeout { attempts: u32, timeout_secs: u64 },

    #[error("Agent invocation failed: {0}")]
    AgentInvocation(String),

    #[error("Cancelled by user")]
    Cancelled,

    // Extraction errors
    #[error("No fenced artifact block found in agent reply")]
    NoArtifactFound,

    #[error(
        "Agent reply contains {blocks} fenced blocks and {tagged} of them are tagged as the expected type; refusing to guess"
    )]
    MultipleArtifacts { blocks: usize, tagged: usize },

    #[error("Extracted artifact block is empty")]
    EmptyArtifact,

    // Filesystem errors
    #[error("Output file already exists: {} (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),

    #[error("No free filename for '{slug}' after {attempts} attempts")]
    FilenameExhaustion { slug: String, attempts: u32 },

    #[error("Failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HtoolError {
    /// Classify this error for reporting and exit-code mapping
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Config(_) => ErrorKind::Config,
            Self::AgentTimeout { .. } => ErrorKind::AgentTimeout,
            Self::AgentInvocation(_) => ErrorKind::AgentInvocation,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::NoArtifactFound => ErrorKind::NoArtifactFound,
            Self::MultipleArtifacts { .. } => ErrorKind::MultipleArtifacts,
            Self::EmptyArtifact => ErrorKind::EmptyArtifact,
            Self::OutputExists(_) => ErrorKind::OutputExists,
            Self::FilenameExhaustion { .. } => ErrorKind::FilenameExhaustion,
            Self::FileWrite { .. } => ErrorKind::FileWrite,
        }
    }

    /// Wrap an I/O error with the path it happened on
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }
}

/// Flat classification of [`HtoolError`], carried in results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Config,
    AgentTimeout,
    AgentInvocation,
    Cancelled,
    NoArtifactFound,
    MultipleArtifacts,
    EmptyArtifact,
    OutputExists,
    FilenameExhaustion,
    FileWrite,
}

impl ErrorKind {
    /// Process exit code for this kind of failure
    ///
    /// `0` is reserved for success and is never returned here.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoArtifactFound | Self::MultipleArtifacts | Self::EmptyArtifact => 1,
            Self::AgentTimeout | Self::AgentInvocation => 2,
            Self::OutputExists | Self::FilenameExhaustion | Self::FileWrite => 3,
            Self::Cancelled => 4,
            Self::InvalidRequest | Self::Config => 5,
        }
    }

    /// Name of the pipeline stage that produces this kind
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidRequest | Self::Config => "request",
            Self::AgentTimeout | Self::AgentInvocation => "agent",
            Self::Cancelled => "cancelled",
            Self::NoArtifactFound | Self::MultipleArtifacts | Self::EmptyArtifact => "extraction",
            Self::OutputExists | Self::FilenameExhaustion => "filename",
            Self::FileWrite => "write",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidRequest => "InvalidRequestError",
            Self::Config => "ConfigError",
            Self::AgentTimeout => "AgentTimeoutError",
            Self::AgentInvocation => "AgentInvocationError",
            Self::Cancelled => "CancelledError",
            Self::NoArtifactFound => "NoArtifactFoundError",
            Self::MultipleArtifacts => "MultipleArtifactsError",
            Self::EmptyArtifact => "EmptyArtifactError",
            Self::OutputExists => "OutputExistsError",
            Self::FilenameExhaustion => "FilenameExhaustionError",
            Self::FileWrite => "FileWriteError",
        };
        f.write_str(name)
    }
}

/// Result type alias using HtoolError
pub type Result<T> = std::result::Result<T, HtoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_stage() {
        assert_eq!(HtoolError::NoArtifactFound.kind().exit_code(), 1);
        assert_eq!(HtoolError::EmptyArtifact.kind().exit_code(), 1);
        assert_eq!(
            HtoolError::MultipleArtifacts { blocks: 2, tagged: 0 }
                .kind()
                .exit_code(),
            1
        );
        assert_eq!(
            HtoolError::AgentTimeout {
                attempts: 3,
                timeout_secs: 10
            }
            .kind()
            .exit_code(),
            2
        );
        assert_eq!(
            HtoolError::AgentInvocation("rejected".to_string())
                .kind()
                .exit_code(),
            2
        );
        assert_eq!(
            HtoolError::OutputExists(PathBuf::from("/tmp/tool.html"))
                .kind()
                .exit_code(),
            3
        );
        assert_eq!(HtoolError::Cancelled.kind().exit_code(), 4);
        assert_eq!(
            HtoolError::InvalidRequest("empty".to_string())
                .kind()
                .exit_code(),
            5
        );
    }

    #[test]
    fn test_file_write_message_names_path() {
        let err = HtoolError::file_write(
            "/nope/tool.html",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::FileWrite);
        assert!(err.to_string().contains("/nope/tool.html"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_kind_display_uses_taxonomy_names() {
        assert_eq!(ErrorKind::NoArtifactFound.to_string(), "NoArtifactFoundError");
        assert_eq!(ErrorKind::OutputExists.to_string(), "OutputExistsError");
    }
}
