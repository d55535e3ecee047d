//! Kernel configuration and preparation steps.
//!
//! Configures the downloaded tree far enough for out-of-tree module builds:
//! install a local config file when one exists, otherwise `make allmodconfig`,
//! then run the kernel's own `prepare` / `modules_prepare` targets. The flag
//! overrides keep older kernel trees building with current toolchains
//! (warnings promoted to errors since, and PIE-by-default compilers).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

use crate::process::Cmd;
use crate::version::KernelVersion;

const CFLAGS: &str = "-Wno-error=attributes -Wno-error=restrict";
const EXTRA_CFLAGS: &str = "-Wno-error=restrict -fno-pie -no-pie";
const HOSTLDFLAGS: &str = "-no-pie";

/// Find a build configuration file for this version in `dir`.
///
/// The generic x86_64 config is preferred; a version-qualified one
/// (`kernel-<base>-x86_64.config`) is the fallback.
pub fn find_config_file(version: &KernelVersion, dir: &Path) -> Option<PathBuf> {
    let names = [
        "kernel-x86_64.config".to_string(),
        format!("kernel-{}-x86_64.config", version.base()),
    ];
    names
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Install a config file into the tree as the active `.config`.
pub fn install_config_file(config: &Path, tree: &Path) -> Result<()> {
    fs::copy(config, tree.join(".config"))
        .with_context(|| format!("Failed to install {}", config.display()))?;
    Ok(())
}

/// Symlink `include/linux/compiler-gcc<N>.h` for the system gcc when the tree
/// predates it, pointing at the newest compat header the tree ships.
pub fn symlink_gcc_header(tree: &Path) -> Result<()> {
    let output = Cmd::new("gcc")
        .arg("-dumpversion")
        .error_msg("gcc version probe failed")
        .run()?;
    let Some(major) = gcc_major(output.stdout_trimmed()) else {
        return Ok(());
    };

    let include_dir = tree.join("include/linux");
    let dest = include_dir.join(format!("compiler-gcc{}.h", major));
    if dest.is_file() {
        return Ok(());
    }

    if let Some(newest) = newest_gcc_header(&include_dir)? {
        let src = include_dir.join(format!("compiler-gcc{}.h", newest));
        std::os::unix::fs::symlink(&src, &dest)
            .with_context(|| format!("Failed to symlink {}", dest.display()))?;
    }
    Ok(())
}

/// Major component of `gcc -dumpversion` output ("11" or "4.8.5").
fn gcc_major(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

/// Highest N among the tree's `compiler-gccN.h` headers.
fn newest_gcc_header(include_dir: &Path) -> Result<Option<u32>> {
    let pattern = Regex::new(r"^compiler-gcc(\d+)\.h$").expect("static regex");
    let mut max = None;
    for entry in fs::read_dir(include_dir)
        .with_context(|| format!("Failed to read {}", include_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(caps) = pattern.captures(&name.to_string_lossy()) {
            if let Ok(n) = caps[1].parse::<u32>() {
                if max.map_or(true, |m| n > m) {
                    max = Some(n);
                }
            }
        }
    }
    Ok(max)
}

/// Configure the tree and run the module-build preparation targets.
///
/// With a `.config` present (distro kernels) the existing answers are kept
/// via `olddefconfig`; upstream kernels get everything as a module.
pub fn prepare_kernel(tree: &Path) -> Result<()> {
    println!("Configuring and preparing modules");

    let config_target = if tree.join(".config").is_file() {
        "olddefconfig"
    } else {
        "allmodconfig"
    };
    make_step(tree, config_target)?;

    // Absolute path: relative program paths resolve against current_dir only
    // on some platforms.
    let config_script = tree.join("scripts/config");
    Cmd::new(config_script.to_string_lossy())
        .args(["--disable", "CONFIG_RETPOLINE"])
        .dir(tree)
        .error_msg("scripts/config failed")
        .run_interactive()?;

    for target in ["prepare", "modules_prepare"] {
        Cmd::new("make")
            .arg(target)
            .arg(format!("EXTRA_CFLAGS={}", EXTRA_CFLAGS))
            .arg(format!("CFLAGS={}", CFLAGS))
            .arg(format!("HOSTLDFLAGS={}", HOSTLDFLAGS))
            .dir(tree)
            .error_msg(format!("make {} failed", target))
            .run_interactive()?;
    }
    Ok(())
}

fn make_step(tree: &Path, target: &str) -> Result<()> {
    Cmd::new("make")
        .arg(target)
        .dir(tree)
        .error_msg(format!("make {} failed", target))
        .run_interactive()?;
    Ok(())
}

/// Generate the kernel/time module's auto-generated headers, if the module
/// exists in this tree. Best-effort: a failure here never aborts the run.
pub fn autogen_time_headers(tree: &Path) {
    let _ = Cmd::new("make")
        .args(["-s", "kernel/time.o"])
        .arg(format!("EXTRA_CFLAGS={}", EXTRA_CFLAGS))
        .arg(format!("CFLAGS={}", CFLAGS))
        .dir(tree)
        .allow_fail()
        .run();
}
