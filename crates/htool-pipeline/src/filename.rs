//! Output path derivation
//!
//! An explicit `--output` path is used as given (made absolute) and never
//! overwritten without `--force`. Otherwise the name is a slug of the
//! description; collisions get a numeric suffix above every existing one.

use htool_core::config::OutputConfig;
use htool_core::{GenerationRequest, HtoolError, ResolvedTarget, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Slug used when the description has no ASCII letters or digits
pub const FALLBACK_SLUG: &str = "html-tool";

/// Lower-case, hyphen-separated, ASCII-only, at most `max_len` chars
pub fn slugify(description: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(description.len());
    let mut pending_hyphen = false;

    for c in description.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(max_len);
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Resolves where an artifact is written
#[derive(Debug, Clone)]
pub struct FilenameDeriver {
    dir: PathBuf,
    extension: String,
    slug_max_len: usize,
    max_collision_suffix: u32,
}

impl Default for FilenameDeriver {
    fn default() -> Self {
        Self::from_config(&OutputConfig::default())
    }
}

impl FilenameDeriver {
    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            extension: config.extension.trim_start_matches('.').to_string(),
            slug_max_len: config.slug_max_len,
            max_collision_suffix: config.max_collision_suffix,
        }
    }

    /// Directory for derived names
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Compute the target for `request`
    pub fn derive(&self, request: &GenerationRequest) -> Result<ResolvedTarget> {
        match request.output_path() {
            Some(path) => self.explicit(path, request.force()),
            None => self.derived(request.description()),
        }
    }

    fn explicit(&self, path: &Path, force: bool) -> Result<ResolvedTarget> {
        let path = absolute(path)?;

        if path.exists() {
            if !force {
                return Err(HtoolError::OutputExists(path));
            }
            debug!("Will overwrite {} (forced)", path.display());
        }

        Ok(ResolvedTarget::new(path).with_overwrite(force))
    }

    fn derived(&self, description: &str) -> Result<ResolvedTarget> {
        let dir = absolute(&self.dir)?;
        let slug = slugify(description, self.slug_max_len);

        let base = dir.join(format!("{}.{}", slug, self.extension));
        if !base.exists() {
            return Ok(ResolvedTarget::new(base));
        }

        let start = highest_suffix(&dir, &slug, &self.extension)
            .map_or(2, |n| n.saturating_add(1))
            .max(2);
        debug!("{} exists; trying -{} onward", base.display(), start);

        let mut attempts: u32 = 1;
        for suffix in start..=self.max_collision_suffix {
            attempts += 1;
            let candidate = dir.join(format!("{}-{}.{}", slug, suffix, self.extension));
            if !candidate.exists() {
                return Ok(ResolvedTarget::new(candidate).with_suffix(suffix));
            }
        }

        Err(HtoolError::FilenameExhaustion { slug, attempts })
    }
}

/// Largest `N` among files named `<slug>-N.<ext>` in `dir`
fn highest_suffix(dir: &Path, slug: &str, extension: &str) -> Option<u32> {
    let pattern = format!(
        r"^{}-(\d+)\.{}$",
        regex::escape(slug),
        regex::escape(extension)
    );
    let re = Regex::new(&pattern).ok()?;

    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            re.captures(name)?.get(1)?.as_str().parse::<u32>().ok()
        })
        .max()
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        HtoolError::InvalidRequest(format!(
            "cannot resolve output path {}: {}",
            path.display(),
            e
        ))
    })
}
