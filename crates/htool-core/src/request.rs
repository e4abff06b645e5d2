//! Request construction
//!
//! A [`GenerationRequest`] can only be obtained through [`RequestBuilder`],
//! so every request in the system has a non-empty, trimmed description.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{HtoolError, Result};

/// One generation request, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    description: String,
    output_path: Option<PathBuf>,
    preview: bool,
    verbose: bool,
    force: bool,
}

impl GenerationRequest {
    /// Trimmed tool description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Explicit output path as given by the user
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn preview(&self) -> bool {
        self.preview
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Allow replacing an existing file at the explicit output path
    pub fn force(&self) -> bool {
        self.force
    }
}

/// Builder for [`GenerationRequest`]
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    description: String,
    output_path: Option<PathBuf>,
    preview: bool,
    verbose: bool,
    force: bool,
}

impl RequestBuilder {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Build from command-line words, joined with single spaces
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let description = words
            .into_iter()
            .map(|w| w.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(description)
    }

    pub fn output(mut self, path: Option<PathBuf>) -> Self {
        self.output_path = path;
        self
    }

    pub fn preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Validate and freeze the request
    pub fn build(self) -> Result<GenerationRequest> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(HtoolError::InvalidRequest(
                "description must not be empty".to_string(),
            ));
        }

        if let Some(path) = &self.output_path {
            if path.as_os_str().is_empty() {
                return Err(HtoolError::InvalidRequest(
                    "output path must not be empty".to_string(),
                ));
            }
        }

        Ok(GenerationRequest {
            description: description.to_string(),
            output_path: self.output_path,
            preview: self.preview,
            verbose: self.verbose,
            force: self.force,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_build_trims_description() {
        let request = RequestBuilder::new("  JSON to YAML converter \n")
            .preview(true)
            .build()
            .unwrap();
        assert_eq!(request.description(), "JSON to YAML converter");
        assert!(request.preview());
        assert!(!request.verbose());
        assert!(!request.force());
        assert!(request.output_path().is_none());
    }

    #[test]
    fn test_whitespace_only_description_rejected() {
        let err = RequestBuilder::new(" \t\n ").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_from_words_joins_with_spaces() {
        let request = RequestBuilder::from_words(["JSON", "to", "YAML"])
            .build()
            .unwrap();
        assert_eq!(request.description(), "JSON to YAML");
    }

    #[test]
    fn test_empty_output_path_rejected() {
        let err = RequestBuilder::new("tool")
            .output(Some(PathBuf::new()))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_output_path_kept_verbatim() {
        let request = RequestBuilder::new("tool")
            .output(Some(PathBuf::from("out/tool.html")))
            .force(true)
            .build()
            .unwrap();
        assert_eq!(request.output_path(), Some(Path::new("out/tool.html")));
        assert!(request.force());
    }
}
