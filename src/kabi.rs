//! KABI whitelist extraction.
//!
//! RHEL kernel SRPMs ship a companion archive with the kernel ABI stablelist
//! (older releases call it a whitelist). The archive name varies across
//! releases, so lookup walks an ordered candidate list. Absence of a file at
//! any step is a normal outcome, not an error: the pipeline simply proceeds
//! without a KABI file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::process::Cmd;
use crate::version::KernelVersion;

/// Whitelist file names recognized inside the companion archive, in
/// preference order.
pub const KABI_FILENAMES: &[&str] = &["kabi_whitelist_x86_64", "kabi_stablelist_x86_64"];

/// Directory inside the companion archive holding the current release's
/// lists. When absent, `kernel.spec` names the right one via `KABI_CURRENT=`.
const KABI_CURRENT_DIR: &str = "kabi-current";

/// Locate and extract a KABI whitelist into `work_dir`.
///
/// Returns the path of the extracted file, or `None` when no companion
/// archive or no recognized file inside one exists. Only genuine I/O or tool
/// failures return an error.
pub fn extract_kabi(
    version: &KernelVersion,
    candidates: &[&str],
    work_dir: &Path,
) -> Result<Option<PathBuf>> {
    // A whitelist may already sit among the unpacked SRPM files.
    for name in candidates {
        let path = work_dir.join(name);
        if path.is_file() {
            return Ok(Some(path));
        }
    }

    let Some(archive) = find_archive(version, work_dir) else {
        return Ok(None);
    };

    let scratch = work_dir.join("kabi");
    if scratch.exists() {
        fs::remove_dir_all(&scratch)?;
    }
    fs::create_dir(&scratch)?;

    let result = extract_from_archive(&archive, work_dir, &scratch, candidates);
    let _ = fs::remove_dir_all(&scratch);
    result
}

/// First companion-archive candidate that exists in `work_dir`, if any.
fn find_archive(version: &KernelVersion, work_dir: &Path) -> Option<PathBuf> {
    archive_candidates(version)
        .into_iter()
        .map(|name| work_dir.join(name))
        .find(|path| path.is_file())
}

/// Ordered companion-archive names for a version. Newer releases use
/// "stablelists", older ones "whitelists"; some name the archive after the
/// release-major only, some not at all.
fn archive_candidates(version: &KernelVersion) -> Vec<String> {
    let trimmed = version.without_el_suffix();
    let mut names = vec![
        format!("kernel-abi-stablelists-{}.tar.bz2", trimmed),
        format!("kernel-abi-whitelists-{}.tar.bz2", trimmed),
        "kernel-abi-whitelists.tar.bz2".to_string(),
    ];
    if let Some(release_major) = version.release_major() {
        names.push(format!("kernel-abi-whitelists-{}.tar.bz2", release_major));
        names.push(format!("kernel-abi-stablelists-{}.tar.bz2", release_major));
    }
    names
}

fn extract_from_archive(
    archive: &Path,
    work_dir: &Path,
    scratch: &Path,
    candidates: &[&str],
) -> Result<Option<PathBuf>> {
    let archive_name = archive
        .file_name()
        .context("KABI archive has no file name")?;
    let staged = scratch.join(archive_name);
    fs::rename(archive, &staged)
        .with_context(|| format!("Failed to stage {}", archive.display()))?;

    Cmd::new("tar")
        .arg("-xjf")
        .arg_path(&staged)
        .dir(scratch)
        .error_msg("KABI archive extraction failed")
        .run()?;

    let lists_dir = scratch.join(current_lists_dir(scratch, work_dir)?);
    for name in candidates {
        let inner = lists_dir.join(name);
        if inner.is_file() {
            let dest = work_dir.join(name);
            fs::copy(&inner, &dest)
                .with_context(|| format!("Failed to copy {}", inner.display()))?;
            return Ok(Some(dest));
        }
    }
    Ok(None)
}

/// Name of the directory holding the current release's lists.
///
/// Prefers the conventional `kabi-current`; otherwise consults the
/// `KABI_CURRENT=` key in the SRPM's `kernel.spec`. With neither present the
/// conventional name stands (and the later file lookup comes up empty).
fn current_lists_dir(scratch: &Path, work_dir: &Path) -> Result<String> {
    if scratch.join(KABI_CURRENT_DIR).is_dir() {
        return Ok(KABI_CURRENT_DIR.to_string());
    }

    let spec = work_dir.join("kernel.spec");
    if spec.is_file() {
        let content = fs::read_to_string(&spec)
            .with_context(|| format!("Failed to read {}", spec.display()))?;
        for line in content.lines() {
            if let Some(dir) = line.strip_prefix("KABI_CURRENT=") {
                return Ok(dir.trim().to_string());
            }
        }
    }
    Ok(KABI_CURRENT_DIR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> KernelVersion {
        s.parse().unwrap()
    }

    #[test]
    fn candidate_order_for_distro_version() {
        let names = archive_candidates(&parse("3.10.0-957.el7"));
        assert_eq!(
            names,
            vec![
                "kernel-abi-stablelists-3.10.0-957.tar.bz2",
                "kernel-abi-whitelists-3.10.0-957.tar.bz2",
                "kernel-abi-whitelists.tar.bz2",
                "kernel-abi-whitelists-957.tar.bz2",
                "kernel-abi-stablelists-957.tar.bz2",
            ]
        );
    }

    #[test]
    fn candidate_order_for_upstream_version() {
        // Upstream kernels have no release part, so no release-major names.
        let names = archive_candidates(&parse("5.10.4"));
        assert_eq!(
            names,
            vec![
                "kernel-abi-stablelists-5.10.4.tar.bz2",
                "kernel-abi-whitelists-5.10.4.tar.bz2",
                "kernel-abi-whitelists.tar.bz2",
            ]
        );
    }

    #[test]
    fn missing_archive_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_kabi(&parse("3.10.0-957.el7"), KABI_FILENAMES, dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn preexisting_whitelist_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("kabi_stablelist_x86_64");
        fs::write(&existing, "symbol_a\nsymbol_b\n").unwrap();

        let result = extract_kabi(&parse("4.18.0-80.el8"), KABI_FILENAMES, dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(result, existing);
    }

    #[test]
    fn candidate_preference_respects_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in KABI_FILENAMES {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        let result = extract_kabi(&parse("4.18.0-80.el8"), KABI_FILENAMES, dir.path())
            .unwrap()
            .unwrap();
        // First name in the list wins when several exist.
        assert_eq!(result, dir.path().join("kabi_whitelist_x86_64"));
    }

    #[test]
    fn kernel_spec_names_the_lists_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("kabi");
        fs::create_dir(&scratch).unwrap();
        fs::write(
            dir.path().join("kernel.spec"),
            "Name: kernel\nKABI_CURRENT=kabi-rhel86\n",
        )
        .unwrap();

        let name = current_lists_dir(&scratch, dir.path()).unwrap();
        assert_eq!(name, "kabi-rhel86");
    }

    #[test]
    fn conventional_dir_wins_over_kernel_spec() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("kabi");
        fs::create_dir_all(scratch.join(KABI_CURRENT_DIR)).unwrap();
        fs::write(dir.path().join("kernel.spec"), "KABI_CURRENT=kabi-rhel86\n").unwrap();

        let name = current_lists_dir(&scratch, dir.path()).unwrap();
        assert_eq!(name, KABI_CURRENT_DIR);
    }

    #[test]
    fn missing_kernel_spec_keeps_convention() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("kabi");
        fs::create_dir(&scratch).unwrap();
        let name = current_lists_dir(&scratch, dir.path()).unwrap();
        assert_eq!(name, KABI_CURRENT_DIR);
    }
}
