//! Best-effort preview in the default viewer

use htool_core::Warning;
use std::path::Path;
use tracing::{debug, warn};

/// Something that can show a file to the user
pub trait Opener: Send + Sync {
    fn open(&self, path: &Path) -> std::io::Result<()>;
}

/// Opens files with the platform's default application
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl Opener for SystemOpener {
    fn open(&self, path: &Path) -> std::io::Result<()> {
        open::that(path)
    }
}

/// Launches previews; failures become warnings, never errors
pub struct Previewer {
    opener: Box<dyn Opener>,
}

impl Previewer {
    pub fn new(opener: impl Opener + 'static) -> Self {
        Self {
            opener: Box::new(opener),
        }
    }

    pub fn system() -> Self {
        Self::new(SystemOpener)
    }

    /// Open `path`; returns a warning if the viewer could not be launched
    pub fn preview(&self, path: &Path) -> Option<Warning> {
        match self.opener.open(path) {
            Ok(()) => {
                debug!("Opened {} in default viewer", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to open {}: {}", path.display(), e);
                Some(Warning::PreviewLaunch(e.to_string()))
            }
        }
    }
}

impl Default for Previewer {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for Previewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Previewer").finish_non_exhaustive()
    }
}
