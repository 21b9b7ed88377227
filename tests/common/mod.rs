//! Shared helpers for CLI integration tests.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// A fixture from tests/fixtures/{name}/ copied into a scratch directory so
/// runs can edit manifests freely.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn copy(name: &str) -> Self {
        let source = manifest_dir().join("tests/fixtures").join(name);
        let dir = TempDir::new().expect("create temp dir");
        copy_tree(&source, dir.path());
        Self { dir }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn manifests(&self) -> PathBuf {
        self.path("manifests")
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("read fixture file")
    }

    /// Original fixture content, before any run touched the copy.
    pub fn pristine(name: &str, rel: &str) -> String {
        let path = manifest_dir().join("tests/fixtures").join(name).join(rel);
        fs::read_to_string(path).expect("read pristine fixture file")
    }
}

fn copy_tree(from: &Path, to: &Path) {
    fs::create_dir_all(to).expect("create fixture dir");
    for entry in fs::read_dir(from).expect("list fixture dir") {
        let entry = entry.expect("fixture entry");
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).expect("copy fixture file");
        }
    }
}

/// Run the tfrec binary with `args`.
pub fn tfrec<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_tfrec"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run tfrec")
}

/// Parse stdout of a successful run as JSON.
pub fn json_stdout(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "tfrec failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("parse stdout JSON")
}
