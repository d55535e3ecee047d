//! Shared helpers for kernel-get integration tests.

#![allow(dead_code)]

use std::env;
use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// A sandboxed working directory for a test.
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create test dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file under the sandbox, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parents");
        }
        fs::write(&path, content).expect("write file");
        path
    }

    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(&path).expect("create dir");
        path
    }
}

/// True when `tool` is available on PATH. Tests that need an external tool
/// skip themselves when it is missing rather than fail the suite.
pub fn tool_available(tool: &str) -> bool {
    which::which(tool).is_ok()
}

/// Write an executable shell script into `dir`, for shadowing external tools.
pub fn write_stub(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, script).expect("write stub");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    path
}

/// Prepends a directory to PATH and restores the original on drop.
///
/// PATH is process-wide state, so tests using this must run serially.
pub struct PathGuard {
    original: OsString,
}

impl PathGuard {
    pub fn prepend(dir: &Path) -> Self {
        let original = env::var_os("PATH").unwrap_or_default();
        let mut prepended = dir.as_os_str().to_os_string();
        prepended.push(":");
        prepended.push(&original);
        env::set_var("PATH", prepended);
        Self { original }
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        env::set_var("PATH", &self.original);
    }
}

/// Create a bzip2 tar archive at `archive` from `dir`'s contents.
pub fn tar_bz2(archive: &Path, dir: &Path, entries: &[&str]) {
    let status = Command::new("tar")
        .arg("-cjf")
        .arg(archive)
        .arg("-C")
        .arg(dir)
        .args(entries)
        .status()
        .expect("run tar");
    assert!(status.success(), "tar -cjf failed");
}

/// Create an xz tar archive at `archive` from `dir`'s contents.
pub fn tar_xz(archive: &Path, dir: &Path, entries: &[&str]) {
    let status = Command::new("tar")
        .arg("-cJf")
        .arg(archive)
        .arg("-C")
        .arg(dir)
        .args(entries)
        .status()
        .expect("run tar");
    assert!(status.success(), "tar -cJf failed");
}
