//! Configuration management for html-tool
//!
//! Settings are read from `.html-tool/config.toml` in the working directory
//! (or an explicit file) and threaded through the pipeline as a value.
//! Every field has a default, so an empty or partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{HtoolError, Result};

/// Directory (relative to the working directory) holding the config file
pub const CONFIG_DIR: &str = ".html-tool";

/// Config file name inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level html-tool configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtoolConfig {
    /// Agent invocation settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Output file naming
    #[serde(default)]
    pub output: OutputConfig,

    /// Artifact extraction rules
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// Which agent backend to call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Spawn an external agent program
    #[default]
    Command,
    /// Call the Anthropic Messages API directly
    Anthropic,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "command" => Ok(Self::Command),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(format!("Invalid backend: {}. Use command or anthropic.", s)),
        }
    }
}

/// Agent invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Upper bound for one attempt, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Additional attempts after a transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff step between attempts, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default)]
    pub command: CommandConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,
}

/// External agent program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments; `{description}` and `{prompt}` are substituted
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Exit codes that mean "try again"
    #[serde(default = "default_retryable_exit_codes")]
    pub retryable_exit_codes: Vec<i32>,
}

/// Anthropic API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Model alias (opus, sonnet, haiku) or a full claude-* model id
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

/// Output naming settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for derived file names
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Extension appended to derived names
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Maximum slug length in characters
    #[serde(default = "default_slug_max_len")]
    pub slug_max_len: usize,

    /// Largest collision suffix tried before giving up
    #[serde(default = "default_max_collision_suffix")]
    pub max_collision_suffix: u32,
}

/// Extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Fence tags that identify the artifact among several blocks
    #[serde(default = "default_expected_tags")]
    pub expected_tags: Vec<String>,

    /// Accept a bare `<!DOCTYPE html>...</html>` when no fence is present
    #[serde(default)]
    pub allow_bare_document: bool,
}

// Default value providers
fn default_timeout_secs() -> u64 {
    90
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    2000
}

fn default_program() -> String {
    "amplifier".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "run".to_string(),
        "--agent".to_string(),
        "html-tool-builder".to_string(),
        "{description}".to_string(),
    ]
}

fn default_retryable_exit_codes() -> Vec<i32> {
    // EX_TEMPFAIL from sysexits.h
    vec![75]
}

fn default_model() -> String {
    "sonnet".to_string()
}

fn default_max_tokens() -> usize {
    16000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_extension() -> String {
    "html".to_string()
}

fn default_slug_max_len() -> usize {
    60
}

fn default_max_collision_suffix() -> u32 {
    1000
}

fn default_expected_tags() -> Vec<String> {
    vec!["html".to_string(), "htm".to_string()]
}

impl HtoolConfig {
    /// Load configuration from `<dir>/.html-tool/config.toml` or use defaults
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HtoolError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            HtoolError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write default configuration to `<dir>/.html-tool/config.toml`
    pub fn write_default(dir: &Path) -> Result<PathBuf> {
        let config_dir = dir.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir)
            .map_err(|e| HtoolError::file_write(&config_dir, e))?;

        let config_path = config_dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| HtoolError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)
            .map_err(|e| HtoolError::file_write(&config_path, e))?;
        Ok(config_path)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.agent.timeout_secs == 0 {
            return Err(HtoolError::Config(
                "agent.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.agent.command.program.trim().is_empty() {
            return Err(HtoolError::Config(
                "agent.command.program must not be empty".to_string(),
            ));
        }
        if self.output.slug_max_len == 0 {
            return Err(HtoolError::Config(
                "output.slug_max_len must be greater than zero".to_string(),
            ));
        }
        if self.output.max_collision_suffix < 2 {
            return Err(HtoolError::Config(
                "output.max_collision_suffix must be at least 2".to_string(),
            ));
        }
        let ext = self.output.extension.trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\']) {
            return Err(HtoolError::Config(format!(
                "output.extension is not a valid extension: {:?}",
                self.output.extension
            )));
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            command: CommandConfig::default(),
            anthropic: AnthropicConfig::default(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            retryable_exit_codes: default_retryable_exit_codes(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            extension: default_extension(),
            slug_max_len: default_slug_max_len(),
            max_collision_suffix: default_max_collision_suffix(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            expected_tags: default_expected_tags(),
            allow_bare_document: false,
        }
    }
}
