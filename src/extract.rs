//! Archive extraction: SRPM to kernel tarball, tarball to source tree.
//!
//! Both stages delegate to external tools (rpm2cpio, cpio, tar) and run with
//! an explicit working directory. A tool failure aborts the run; nothing
//! attempts to clean a partially extracted tree inside the working area.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::process::{shell_in, Cmd};
use crate::version::KernelVersion;

/// Unpack a kernel source RPM into `work_dir` and return the kernel tarball
/// it deposited.
///
/// The SRPM carries loose files (patches, kernel.spec, KABI archives) plus
/// the kernel source tarball, named `linux-<version>.tar.xz` for newer
/// releases and `linux-<version>.tar.bz2` for older ones.
pub fn extract_source_package(
    rpm: &Path,
    version: &KernelVersion,
    work_dir: &Path,
) -> Result<PathBuf> {
    let pipeline = format!("rpm2cpio '{}' | cpio -idm --quiet", rpm.display());
    shell_in(&pipeline, work_dir)
        .with_context(|| format!("Failed to unpack source RPM {}", rpm.display()))?;

    for name in [
        format!("linux-{}.tar.xz", version),
        format!("linux-{}.tar.bz2", version),
    ] {
        let candidate = work_dir.join(&name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!(
        "Source RPM {} did not contain a kernel tarball for version {}",
        rpm.display(),
        version
    )
}

/// Extract a kernel tarball in `work_dir` and return the absolute path of the
/// resulting source directory. The tarball is deleted after a successful
/// extraction.
pub fn extract_tar(tar: &Path, work_dir: &Path) -> Result<PathBuf> {
    let file_name = tar
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid archive name: {}", tar.display()))?;

    let (tar_opts, dir_name) = match tar_directory_name(file_name) {
        Some(v) => v,
        None => bail!("Unsupported archive format: {}", file_name),
    };

    println!("Extracting {}", file_name);
    Cmd::new("tar")
        .arg(tar_opts)
        .arg_path(tar)
        .dir(work_dir)
        .error_msg(format!("Extraction of {} failed", file_name))
        .run()?;

    let dir = work_dir.join(dir_name);
    if !dir.is_dir() {
        bail!(
            "Archive {} did not produce the expected directory {}",
            file_name,
            dir.display()
        );
    }

    // Only a verified extraction consumes the archive.
    fs::remove_file(tar)
        .with_context(|| format!("Failed to remove extracted archive {}", tar.display()))?;
    Ok(dir)
}

/// Map an archive file name to the tar flags that unpack it and the top-level
/// directory it produces (the file name minus its compound suffix).
fn tar_directory_name(file_name: &str) -> Option<(&'static str, &str)> {
    if let Some(stem) = file_name.strip_suffix(".tar.xz") {
        Some(("-xJf", stem))
    } else {
        file_name.strip_suffix(".tar.bz2").map(|stem| ("-xjf", stem))
    }
}
