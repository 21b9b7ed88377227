//! Manifest files on disk and the resolved view used to search them.
//!
//! Only the original contents are ever written back; the resolved view is a
//! throwaway copy with variable and identity references substituted so that
//! declarations can be matched against literal values from state.
use std::path::PathBuf;

mod loader;
mod resolve;
pub mod scan;

pub use loader::{load_manifest_files, load_variables};
pub use resolve::{resolve_view, Variables};

/// One manifest file: its path and its current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub path: PathBuf,
    pub contents: String,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}
