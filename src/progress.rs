//! Progress reporting and scan observation.
//!
//! The library never prints on its own. Components that run long batches
//! (the [`Inventory`](crate::inventory::Inventory), the
//! [`DuplicateFinder`](crate::duplicates::DuplicateFinder) and the deletion
//! pass) report through a [`ScanObserver`] injected at construction.
//!
//! [`Progress`] is the terminal implementation backed by indicatif.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::scanner::AccessError;

/// Stages reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Registering discovered files in the inventory
    Discovery,
    /// Hashing the prefix of same-size files
    Prehash,
    /// Hashing the full content of prehash matches
    FullHash,
    /// Removing confirmed duplicates
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discovery => "discovery",
            Self::Prehash => "prehash",
            Self::FullHash => "fullhash",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Observer for inventory and duplicate-detection events.
///
/// Every method has a no-op default so implementors only override what
/// they display.
pub trait ScanObserver: Send + Sync {
    /// Called when a phase starts with the number of items it will visit.
    fn on_phase_start(&self, _phase: Phase, _total: usize) {}

    /// Called for each item processed (1-based).
    fn on_progress(&self, _current: usize, _path: &str) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, _phase: Phase) {}

    /// Called when a file is dropped from processing.
    fn on_skipped(&self, _phase: Phase, _error: &AccessError) {}

    /// Called after a duplicate was removed.
    fn on_deleted(&self, _path: &str, _bytes: u64) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupfinder::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            quiet,
        }
    }

    fn style_for(phase: Phase) -> ProgressStyle {
        match phase {
            Phase::Discovery => ProgressStyle::with_template(
                "{spinner:.green} {prefix} [{elapsed_precise}] {pos}/{len} files {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            Phase::Prehash | Phase::Delete => ProgressStyle::with_template(
                "{prefix:>9} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-"),
            Phase::FullHash => ProgressStyle::with_template(
                "{prefix:>9} [{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-"),
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress").field("quiet", &self.quiet).finish()
    }
}

impl ScanObserver for Progress {
    fn on_phase_start(&self, phase: Phase, total: usize) {
        if self.quiet {
            return;
        }
        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(Self::style_for(phase));
        pb.set_prefix(phase.to_string());
        if phase == Phase::Discovery {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        if let Ok(mut active) = self.active.lock() {
            if let Some(previous) = active.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        if let Ok(active) = self.active.lock() {
            if let Some(ref pb) = *active {
                pb.set_position(current as u64);
                pb.set_message(truncate_path(path, 30));
            }
        }
    }

    fn on_phase_end(&self, phase: Phase) {
        if self.quiet {
            return;
        }
        if let Ok(mut active) = self.active.lock() {
            if let Some(pb) = active.take() {
                pb.finish_with_message(format!("{phase} complete"));
            }
        }
    }

    fn on_skipped(&self, phase: Phase, error: &AccessError) {
        if self.quiet {
            return;
        }
        let _ = self.multi.println(format!("skipped during {phase}: {error}"));
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
