use super::{ManifestFile, Variables};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Read every manifest file directly under `dir` (no recursion).
///
/// Files are returned sorted by path so repeated runs edit in the same order.
pub fn load_manifest_files(dir: &Path, extension: &str) -> Result<Vec<ManifestFile>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read manifest dir {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("list manifest dir {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        paths.push(path);
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        files.push(ManifestFile::new(path, contents));
    }
    tracing::debug!(dir = %dir.display(), files = files.len(), "loaded manifest files");
    Ok(files)
}

/// Read a flat `key = "value"` variables file.
///
/// A missing or unreadable file is not an error: recommendations still apply
/// to manifests that do not reference variables.
pub fn load_variables(path: &Path) -> Variables {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "no variables file");
            return Variables::new();
        }
    };
    parse_variables(&content)
}

fn parse_variables(content: &str) -> Variables {
    let mut variables = Variables::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        variables.insert(key.to_string(), variable_value(value).to_string());
    }
    variables
}

/// A quoted value ends at its closing quote, so trailing comments are dropped.
fn variable_value(raw: &str) -> &str {
    let raw = raw.trim();
    let Some(quoted) = raw.strip_prefix('"') else {
        return raw;
    };
    let mut escaped = false;
    for (idx, ch) in quoted.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return &quoted[..idx],
            _ => escaped = false,
        }
    }
    quoted
}
