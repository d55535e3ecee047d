//! The acquisition pipeline: resolve, download, extract, prepare, install.
//!
//! All work happens inside an isolated temporary directory; the finished tree
//! is moved into the output directory as the last step, so a failed run never
//! leaves a partial tree where the caller looks for results.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::configure;
use crate::extract;
use crate::fetch::{self, ConsoleProgress};
use crate::kabi;
use crate::locate::{self, AcquisitionPlan, ArchiveFormat};
use crate::process::require_tool;
use crate::version::KernelVersion;

pub struct Options {
    pub version: KernelVersion,
    pub output_dir: PathBuf,
    pub kabi: bool,
}

/// Run the full pipeline. Returns the path of the installed source tree.
pub fn run(opts: &Options) -> Result<PathBuf> {
    fs::create_dir_all(&opts.output_dir)
        .with_context(|| format!("Failed to create {}", opts.output_dir.display()))?;
    // Config files are looked up where the user invoked the tool.
    let invocation_dir = std::env::current_dir().context("Cannot determine current directory")?;

    let plan = locate::resolve(&opts.version)?;
    preflight(&plan)?;

    let work = TempDir::new().context("Failed to create temporary working directory")?;
    let work_dir = work.path();

    println!("Downloading kernel version {}", opts.version);
    let download = work_dir.join(&plan.file_name);
    fetch::fetch(&plan.url, &download, &mut ConsoleProgress::new())?;

    let tarball = match plan.format {
        ArchiveFormat::Srpm => {
            extract::extract_source_package(&download, &opts.version, work_dir)?
        }
        ArchiveFormat::TarXz | ArchiveFormat::TarBz2 => download,
    };
    let tree = extract::extract_tar(&tarball, work_dir)?;
    println!(
        "Kernel sources for version {} are in directory {}",
        opts.version,
        tree.display()
    );

    if let Some(config) = configure::find_config_file(&opts.version, &invocation_dir) {
        println!("Using config file {}", config.display());
        configure::install_config_file(&config, &tree)?;
    }
    configure::symlink_gcc_header(&tree)?;
    configure::prepare_kernel(&tree)?;
    configure::autogen_time_headers(&tree);

    if opts.kabi {
        match kabi::extract_kabi(&opts.version, kabi::KABI_FILENAMES, work_dir)? {
            Some(file) => {
                let name = file.file_name().context("KABI file has no name")?;
                fs::rename(&file, tree.join(name))
                    .with_context(|| format!("Failed to install {}", file.display()))?;
            }
            None => println!("No KABI whitelist found for {}", opts.version),
        }
    }

    let installed = install_tree(&tree, &opts.output_dir)?;
    println!("Done: {}", installed.display());
    Ok(installed)
}

/// Verify the external tools this plan needs before downloading anything.
fn preflight(plan: &AcquisitionPlan) -> Result<()> {
    require_tool("tar", "Required to unpack kernel sources.")?;
    require_tool("make", "Required to run kernel preparation steps.")?;
    require_tool("gcc", "Required to configure the kernel.")?;
    if plan.format == ArchiveFormat::Srpm {
        require_tool("rpm2cpio", "Required to unpack source RPMs.")?;
        require_tool("cpio", "Required to unpack source RPMs.")?;
    }
    Ok(())
}

/// Move the finished tree into the output directory, replacing any existing
/// directory of the same name.
fn install_tree(tree: &Path, output_dir: &Path) -> Result<PathBuf> {
    let name = tree
        .file_name()
        .with_context(|| format!("Source tree has no name: {}", tree.display()))?;
    let target = output_dir.join(name);
    if target.is_dir() {
        fs::remove_dir_all(&target)
            .with_context(|| format!("Failed to replace {}", target.display()))?;
    }
    move_dir(tree, &target)?;
    Ok(target)
}

/// Rename when possible; fall back to copy-and-delete when the temp area and
/// the output directory live on different filesystems.
fn move_dir(src: &Path, dest: &Path) -> Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_dir_all(src, dest)
                .with_context(|| format!("Failed to move tree to {}", dest.display()))?;
            fs::remove_dir_all(src)?;
            Ok(())
        }
    }
}

fn copy_dir_all(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let meta = fs::symlink_metadata(&from)?;
        if meta.is_dir() {
            copy_dir_all(&from, &to)?;
        } else if meta.is_symlink() {
            let link = fs::read_link(&from)?;
            std::os::unix::fs::symlink(link, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}
