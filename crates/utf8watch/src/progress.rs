use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};

/// Width of the rendered bar in slots.
pub const BAR_WIDTH: usize = 30;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub total: usize,
    pub processed: usize,
}

impl ProgressState {
    /// `processed / total`, or `None` before anything was submitted.
    pub fn ratio(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.processed as f64 / self.total as f64)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }

    /// `[###       ] 1/3 files processed.`, or `None` when `total` is zero.
    pub fn render_bar(&self) -> Option<String> {
        let ratio = self.ratio()?;
        let filled = ((ratio * BAR_WIDTH as f64).floor() as usize).min(BAR_WIDTH);
        Some(format!(
            "[{:<width$}] {}/{} files processed.",
            "#".repeat(filled),
            self.processed,
            self.total,
            width = BAR_WIDTH
        ))
    }
}

/// Submission and completion counters shared by the scanner, the watch
/// adapter and the workers.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    total: AtomicUsize,
    processed: AtomicUsize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one task at submission time.
    pub fn record_submitted(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_submitted_many(&self, count: usize) {
        self.total.fetch_add(count, Ordering::SeqCst);
    }

    /// Counts one finished task, whatever its outcome, and re-renders.
    pub fn record_completed(&self, path: &Path) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.report();
        debug!("File processed: {}", path.display());
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressState {
        // `processed` first: every completion was preceded by its submission,
        // so a later read of `total` can only be larger.
        let processed = self.processed.load(Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);
        ProgressState { total, processed }
    }

    pub fn render_bar(&self) -> Option<String> {
        self.snapshot().render_bar()
    }

    /// Logs the bar at info level. Nothing is logged while `total` is zero.
    pub fn report(&self) {
        if let Some(bar) = self.render_bar() {
            info!("Progress: {}", bar);
        }
    }
}
