//! Applying matched recommendations to a manifest directory.
//!
//! Each recommendation is one step of a fold over the current file contents:
//! the resolved view is rebuilt before every step so line numbers always
//! reflect earlier edits to the same file. Files are written once, at the end.
use crate::config::EngineConfig;
use crate::manifest::{load_manifest_files, load_variables, resolve_view, ManifestFile, Variables};
use crate::recommendation::ClaimedRecommendation;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

mod iam;
mod vm;

pub use iam::apply_iam_edits;
pub use vm::apply_vm_edits;

/// Where and whether to write edited manifests.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Output directory; defaults to the manifest directory.
    pub write_dir: Option<PathBuf>,
    /// Compute edits and claims without writing anything.
    pub dry_run: bool,
}

/// Outcome of one patch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    pub claimed: Vec<ClaimedRecommendation>,
    /// Files whose content changed (written unless the run was a dry run).
    pub changed_files: Vec<PathBuf>,
}

/// Manifest files of one run with their contents as first loaded.
struct Workspace<'c> {
    manifest_dir: PathBuf,
    config: &'c EngineConfig,
    variables: Variables,
    files: Vec<ManifestFile>,
    loaded: Vec<String>,
}

impl<'c> Workspace<'c> {
    fn load(manifest_dir: &Path, config: &'c EngineConfig) -> Result<Self> {
        if !manifest_dir.is_dir() {
            return Err(anyhow!(
                "manifest dir {} does not exist",
                manifest_dir.display()
            ));
        }
        let files = load_manifest_files(manifest_dir, &config.manifest_extension)?;
        let variables = load_variables(&manifest_dir.join(&config.variables_file));
        let loaded = files.iter().map(|file| file.contents.clone()).collect();
        Ok(Self {
            manifest_dir: manifest_dir.to_path_buf(),
            config,
            variables,
            files,
            loaded,
        })
    }

    /// Resolved view of the current contents.
    fn resolved(&self) -> Vec<ManifestFile> {
        resolve_view(
            &self.files,
            &self.variables,
            &self.config.service_account_type,
        )
    }

    /// Write every changed file under its own file name in the output dir.
    fn write_changes(&self, options: &ApplyOptions) -> Result<Vec<PathBuf>> {
        let write_dir = options
            .write_dir
            .clone()
            .unwrap_or_else(|| self.manifest_dir.clone());
        let mut changed = Vec::new();
        for (file, loaded) in self.files.iter().zip(&self.loaded) {
            if &file.contents == loaded {
                continue;
            }
            let name = file
                .path
                .file_name()
                .ok_or_else(|| anyhow!("manifest path {} has no file name", file.path.display()))?;
            let target = write_dir.join(name);
            if !options.dry_run {
                fs::create_dir_all(&write_dir)
                    .with_context(|| format!("create write dir {}", write_dir.display()))?;
                fs::write(&target, file.contents.as_bytes())
                    .with_context(|| format!("write {}", target.display()))?;
                tracing::info!(path = %target.display(), "wrote manifest");
            }
            changed.push(target);
        }
        Ok(changed)
    }
}

/// Claims in first-claimed order, each at most once.
#[derive(Debug, Default)]
struct Claims {
    entries: Vec<ClaimedRecommendation>,
}

impl Claims {
    fn push(&mut self, claim: ClaimedRecommendation) {
        if !self.entries.contains(&claim) {
            self.entries.push(claim);
        }
    }

    fn into_report(self, changed_files: Vec<PathBuf>) -> PatchReport {
        PatchReport {
            claimed: self.entries,
            changed_files,
        }
    }
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
