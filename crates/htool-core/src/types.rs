//! Core data model for a single generation run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{ErrorKind, HtoolError};

/// Raw reply from the agent collaborator
///
/// The text is kept verbatim. It is never written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    /// The reply text exactly as the agent returned it
    pub raw_text: String,
    /// How many attempts it took to obtain this reply (1 = first try)
    pub attempts: u32,
    /// When the reply was received
    pub received_at: DateTime<Utc>,
}

impl AgentReply {
    pub fn new(raw_text: impl Into<String>, attempts: u32) -> Self {
        Self {
            raw_text: raw_text.into(),
            attempts,
            received_at: Utc::now(),
        }
    }
}

/// Non-fatal observations made while extracting an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// Content does not start with `<!DOCTYPE html>` or `<html>`
    MissingDocumentRoot,
    /// No fenced block was present; a bare document was taken from the reply
    BareDocumentFallback,
}

impl std::fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDocumentRoot => write!(
                f,
                "artifact does not start with <!DOCTYPE html> or <html>; it may not be a complete document"
            ),
            Self::BareDocumentFallback => {
                write!(f, "no fenced block found; used the bare HTML document in the reply")
            }
        }
    }
}

/// The single deliverable extracted from an agent reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Trimmed, non-empty content
    pub content: String,
    /// Language tag on the fence, if any (e.g. `html`)
    pub declared_tag: Option<String>,
    /// Non-fatal issues to surface to the user
    pub warnings: Vec<ExtractionWarning>,
}

impl Artifact {
    pub fn new(content: impl Into<String>, declared_tag: Option<String>) -> Self {
        Self {
            content: content.into(),
            declared_tag,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: ExtractionWarning) -> Self {
        self.warnings.push(warning);
        self
    }

    /// Size of the content in bytes
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Where an artifact will be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    /// Absolute path of the final file
    pub path: PathBuf,
    /// Numeric suffix appended to avoid a collision (`-2`, `-3`, ...)
    pub collision_suffix: Option<u32>,
    /// Whether an existing file at `path` may be replaced
    pub overwrite: bool,
}

impl ResolvedTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            collision_suffix: None,
            overwrite: false,
        }
    }

    pub fn with_suffix(mut self, suffix: u32) -> Self {
        self.collision_suffix = Some(suffix);
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Non-fatal warnings surfaced at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "message")]
pub enum Warning {
    Extraction(ExtractionWarning),
    /// The default viewer could not be launched
    PreviewLaunch(String),
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extraction(w) => write!(f, "{}", w),
            Self::PreviewLaunch(reason) => write!(f, "preview failed: {}", reason),
        }
    }
}

/// Terminal value of a pipeline run, consumed by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Correlates log lines of one run
    pub run_id: Uuid,
    pub success: bool,
    /// Absolute path of the written artifact
    pub file_path: Option<PathBuf>,
    pub error_kind: Option<ErrorKind>,
    pub message: Option<String>,
    pub bytes_written: usize,
    pub warnings: Vec<Warning>,
    /// Raw agent reply, kept only for verbose runs
    pub raw_reply: Option<String>,
    /// Extraction decisions, kept only for verbose runs
    pub trace: Vec<String>,
}

impl GenerationResult {
    /// A fresh, not yet successful result for `run_id`
    pub fn pending(run_id: Uuid) -> Self {
        Self {
            run_id,
            success: false,
            file_path: None,
            error_kind: None,
            message: None,
            bytes_written: 0,
            warnings: Vec::new(),
            raw_reply: None,
            trace: Vec::new(),
        }
    }

    /// Mark the run successful
    pub fn succeed(mut self, file_path: PathBuf, bytes_written: usize) -> Self {
        self.success = true;
        self.file_path = Some(file_path);
        self.bytes_written = bytes_written;
        self.error_kind = None;
        self.message = None;
        self
    }

    /// Mark the run failed with `error`
    pub fn fail(mut self, error: &HtoolError) -> Self {
        self.success = false;
        self.file_path = None;
        self.error_kind = Some(error.kind());
        self.message = Some(error.to_string());
        self
    }

    /// Process exit code for this result
    pub fn exit_code(&self) -> i32 {
        if self.success {
            return 0;
        }
        self.error_kind.map(|k| k.exit_code()).unwrap_or(1)
    }
}
