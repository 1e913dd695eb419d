//! Progress reporting utilities using indicatif.
//!
//! [`BatchProgress`] implements [`ResolveProgress`] to show a progress bar
//! while a batch resolution walks the checked items.
//!
//! # Accessible Mode
//!
//! When accessible mode is enabled the bar uses plain ASCII and per-item
//! failures are printed on their own line instead of only in the message.

use std::path::Path;
use std::sync::Mutex;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::actions::resolve::{BatchOutcome, ResolveProgress};

/// Progress bar for a batch resolution.
pub struct BatchProgress {
    bar: Mutex<Option<ProgressBar>>,
    freed: Mutex<u64>,
    quiet: bool,
    accessible: bool,
}

impl BatchProgress {
    /// Create a new progress reporter.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupekeep::progress::BatchProgress;
    ///
    /// let progress = BatchProgress::new(true);
    /// assert!(!progress.is_accessible());
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self::with_accessible(quiet, false)
    }

    /// Create a new progress reporter with accessible mode.
    #[must_use]
    pub fn with_accessible(quiet: bool, accessible: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            freed: Mutex::new(0),
            quiet,
            accessible,
        }
    }

    /// Check if accessible mode is enabled.
    #[must_use]
    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    /// Bytes reported freed so far.
    #[must_use]
    pub fn bytes_freed(&self) -> u64 {
        self.freed.lock().map(|freed| *freed).unwrap_or(0)
    }

    fn style(&self) -> ProgressStyle {
        if self.accessible {
            ProgressStyle::with_template("[{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-")
        } else {
            ProgressStyle::with_template(
                "[{elapsed_precise}] [{bar:40.red/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(ref pb) = *guard {
                f(pb);
            }
        }
    }
}

impl ResolveProgress for BatchProgress {
    fn on_before_resolve(&self, path: &Path, index: usize, total: usize) {
        if self.quiet {
            return;
        }
        if let Ok(mut guard) = self.bar.lock() {
            let pb = guard.get_or_insert_with(|| {
                let pb = ProgressBar::new(total as u64);
                pb.set_style(self.style());
                pb
            });
            pb.set_position(index as u64);
            pb.set_message(truncate_path(&path.to_string_lossy(), 40));
        }
    }

    fn on_resolve_success(&self, _path: &Path, size: u64) {
        if let Ok(mut freed) = self.freed.lock() {
            *freed += size;
        }
        self.with_bar(|pb| pb.inc(1));
    }

    fn on_resolve_failure(&self, path: &Path, error: &str) {
        if self.quiet {
            return;
        }
        self.with_bar(|pb| {
            pb.inc(1);
            if self.accessible {
                pb.println(format!("Failed: {} ({})", path.display(), error));
            } else {
                pb.set_message(format!("failed: {}", truncate_path(&path.to_string_lossy(), 30)));
            }
        });
    }

    fn on_complete(&self, outcome: &BatchOutcome) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                let message = if outcome.cancelled {
                    "Cancelled".to_string()
                } else {
                    format!("Done, {} freed", ByteSize::b(outcome.bytes_freed))
                };
                pb.finish_with_message(message);
            }
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
