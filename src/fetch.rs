//! Streaming HTTP download with progress reporting.
//!
//! The transfer is blocking and single-shot: no retries, no timeout policy.
//! A failed transfer is fatal for the whole run. Progress goes through an
//! explicit reporter object handed in by the caller; its `finish` is
//! guaranteed to run whether the transfer succeeds or not.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Receives download progress callbacks from the fetch loop.
///
/// Callbacks are synchronous; there is no background thread behind them.
pub trait Progress {
    /// Called once before the first byte, with the expected total size when
    /// the server reported one.
    fn start(&mut self, total: Option<u64>);
    /// Called after each chunk with the cumulative byte count.
    fn update(&mut self, written: u64);
    /// Called exactly once when the transfer ends, successfully or not.
    fn finish(&mut self);
}

/// Renders a percentage bar on stderr. Suppressed entirely when the server
/// did not report a total size.
pub struct ConsoleProgress {
    total: Option<u64>,
    last_percent: u64,
    active: bool,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            total: None,
            last_percent: 0,
            active: false,
        }
    }

    fn render(&self, percent: u64) {
        const WIDTH: u64 = 50;
        let filled = (percent * WIDTH / 100).min(WIDTH) as usize;
        eprint!(
            "\r{:3}% [{}{}]",
            percent,
            "=".repeat(filled),
            " ".repeat(WIDTH as usize - filled)
        );
        let _ = std::io::stderr().flush();
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for ConsoleProgress {
    fn start(&mut self, total: Option<u64>) {
        self.total = total.filter(|t| *t > 0);
        self.last_percent = 0;
        if self.total.is_some() {
            self.active = true;
            self.render(0);
        }
    }

    fn update(&mut self, written: u64) {
        let Some(total) = self.total else { return };
        let percent = (written.saturating_mul(100) / total).min(100);
        if percent != self.last_percent {
            self.last_percent = percent;
            self.render(percent);
        }
    }

    fn finish(&mut self) {
        if self.active {
            eprintln!();
            self.active = false;
        }
    }
}

/// Calls `finish` on drop, so the progress display is cleared on every exit
/// path out of `fetch`, including errors.
struct FinishGuard<'a>(&'a mut dyn Progress);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Download `url` to `dest`, streaming in chunks. Returns the byte count.
///
/// A failure may leave a partial file at `dest`; the caller owns the
/// surrounding working directory and its cleanup.
pub fn fetch(url: &str, dest: &Path, progress: &mut dyn Progress) -> Result<u64> {
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        bail!("Download of {} failed: HTTP {}", url, response.status());
    }

    let total = response.content_length();
    let mut file = File::create(dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    progress.start(total);
    let guard = FinishGuard(progress);

    let mut reader = response;
    let mut buf = [0u8; 64 * 1024];
    let mut written: u64 = 0;
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Transfer from {} failed", url))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        written += n as u64;
        guard.0.update(written);
    }

    drop(guard);
    Ok(written)
}
