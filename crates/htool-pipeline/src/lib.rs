//! html-tool generation pipeline
//!
//! Turns an agent reply into a saved HTML file:
//! - [`ArtifactExtractor`]: pick exactly one fenced block from the reply
//! - [`FilenameDeriver`]: explicit path or collision-free slug
//! - [`Persister`]: temp file + rename, never a partial file
//! - [`Previewer`]: best-effort open in the default viewer
//! - [`Pipeline`]: runs the stages in order for one request

mod extractor;
mod filename;
mod persister;
mod pipeline;
mod preview;

pub use extractor::{has_document_root, scan_fences, ArtifactExtractor, FenceScan, FencedBlock};
pub use filename::{slugify, FilenameDeriver, FALLBACK_SLUG};
pub use persister::{Persister, StagedWrite};
pub use pipeline::Pipeline;
pub use preview::{Opener, Previewer, SystemOpener};
