//! kernel-get - download and prepare Linux kernel sources.
//!
//! Resolves a kernel version string to a download source (kernel.org tarball,
//! internal build-system SRPM, or CentOS vault SRPM), fetches and extracts
//! the sources, runs the kernel's module-build preparation steps, and
//! installs the finished tree into the output directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use kernel_get::pipeline::{self, Options};
use kernel_get::version::KernelVersion;

#[derive(Parser)]
#[command(name = "kernel-get")]
#[command(about = "Get RHEL-based and upstream Linux kernel sources")]
struct Cli {
    /// Kernel version to fetch, e.g. "5.10.4" or "3.10.0-957.el7"
    version: KernelVersion,

    /// Output directory (default: current directory)
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Include the KABI whitelist
    #[arg(long)]
    kabi: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let output_dir = match cli.output_dir {
        Some(dir) => {
            if dir.is_absolute() {
                dir
            } else {
                std::env::current_dir()?.join(dir)
            }
        }
        None => std::env::current_dir()?,
    };

    let opts = Options {
        version: cli.version,
        output_dir,
        kabi: cli.kabi,
    };
    pipeline::run(&opts)?;
    Ok(())
}
