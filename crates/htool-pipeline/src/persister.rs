//! Atomic artifact persistence
//!
//! Content goes to a temporary file next to the target, is synced, and is
//! then renamed into place. A crash or cancellation before the rename
//! leaves the target untouched; the temporary file is removed on drop, and
//! so are any directories the write had to create.

use htool_core::{Artifact, HtoolError, ResolvedTarget, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, PersistError};
use tracing::{debug, info};

const TEMP_PREFIX: &str = ".html-tool-";
const TEMP_SUFFIX: &str = ".tmp";

/// Writes artifacts with temp-file-and-rename discipline
#[derive(Debug, Clone, Copy, Default)]
pub struct Persister;

impl Persister {
    pub fn new() -> Self {
        Self
    }

    /// Write `artifact` to `target`, returning the number of bytes written
    pub fn write(&self, target: &ResolvedTarget, artifact: &Artifact) -> Result<usize> {
        self.stage(target, artifact)?.commit()
    }

    /// Write the content to a temporary file beside the target
    ///
    /// Nothing is visible at the target path until [`StagedWrite::commit`].
    pub fn stage(&self, target: &ResolvedTarget, artifact: &Artifact) -> Result<StagedWrite> {
        let parent = target
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        // Declared before `temp` so the temp file is gone before cleanup runs
        let dirs = CreatedDirs::create(parent)?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(parent)
            .map_err(|e| HtoolError::file_write(&target.path, e))?;

        let bytes = artifact.len();
        temp.write_all(artifact.content.as_bytes())
            .and_then(|_| temp.flush())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| HtoolError::file_write(&target.path, e))?;

        debug!("Staged {} bytes at {}", bytes, temp.path().display());

        Ok(StagedWrite {
            temp,
            target: target.path.clone(),
            overwrite: target.overwrite,
            bytes,
            dirs,
        })
    }
}

/// A fully written temporary file waiting to be renamed into place
///
/// Dropping it without calling [`commit`](Self::commit) deletes the
/// temporary file and any directories created for it, leaving the target
/// path untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
    overwrite: bool,
    bytes: usize,
    dirs: CreatedDirs,
}

impl StagedWrite {
    /// Location of the temporary file
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically move the temporary file to the target
    pub fn commit(self) -> Result<usize> {
        let StagedWrite {
            temp,
            target,
            overwrite,
            bytes,
            dirs,
        } = self;

        let persisted = if overwrite {
            temp.persist(&target)
        } else {
            temp.persist_noclobber(&target)
        };

        let PersistError { error, file } = match persisted {
            Ok(_) => {
                dirs.keep();
                info!("Wrote {} ({} bytes)", target.display(), bytes);
                return Ok(bytes);
            }
            Err(e) => e,
        };

        // Temp file first, then the directories it lived in
        drop(file);
        drop(dirs);

        if error.kind() == io::ErrorKind::AlreadyExists {
            Err(HtoolError::OutputExists(target))
        } else {
            Err(HtoolError::file_write(target, error))
        }
    }
}

/// Directories created for a write, removed again unless kept
///
/// Only directories that did not exist before the write are removed, and
/// only while they are empty.
#[derive(Debug)]
struct CreatedDirs {
    leaf: PathBuf,
    /// Topmost directory this write created
    root: Option<PathBuf>,
}

impl CreatedDirs {
    fn create(dir: &Path) -> Result<Self> {
        let root = dir
            .ancestors()
            .take_while(|a| !a.as_os_str().is_empty() && !a.exists())
            .last()
            .map(Path::to_path_buf);

        let created = Self {
            leaf: dir.to_path_buf(),
            root,
        };
        if created.root.is_some() {
            // On failure `created` drops and removes any partial chain
            std::fs::create_dir_all(dir).map_err(|e| HtoolError::file_write(dir, e))?;
            info!("Created directory: {}", dir.display());
        }
        Ok(created)
    }

    fn keep(mut self) {
        self.root = None;
    }
}

impl Drop for CreatedDirs {
    fn drop(&mut self) {
        let Some(root) = self.root.take() else {
            return;
        };
        for dir in self.leaf.ancestors() {
            if dir.exists() {
                if let Err(e) = std::fs::remove_dir(dir) {
                    debug!("Keeping directory {}: {}", dir.display(), e);
                    break;
                }
                debug!("Removed directory: {}", dir.display());
            }
            if dir == root {
                break;
            }
        }
    }
}
