//! Progress tracking for a stage's batch.
//!
//! A [`ProgressTracker`] counts attempts and failures for one stage execution
//! and renders a live indicatif bar. Counters are plain integers: every
//! mutation happens on the orchestrating task after a worker future resolves,
//! never from inside a worker, so no synchronization is needed.

use indicatif::{ProgressBar, ProgressStyle};

/// Attempt/failure counters plus an optional live progress bar.
///
/// The bar label is repainted only when the failure count rose since the last
/// paint, keeping terminal churn low on mostly-successful batches.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    bar: Option<ProgressBar>,
    label: String,
    tries: u64,
    fails: u64,
    last_painted_fails: u64,
}

impl ProgressTracker {
    /// Creates an idle tracker. Call [`start`](Self::start) before a batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets counters and begins a bar of `total` items labeled `label`.
    pub fn start(&mut self, total: usize, label: &str) {
        self.tries = 0;
        self.fails = 0;
        self.last_painted_fails = 0;
        self.label = label.to_string();

        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} {wide_bar} {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(self.label.clone());
        self.bar = Some(bar);
    }

    /// Records one attempt and advances the display.
    pub fn advance(&mut self) {
        self.tries += 1;
        if let Some(bar) = &self.bar {
            if self.fails > self.last_painted_fails {
                bar.set_message(format!("{} ({} fails)", self.label, self.fails));
                self.last_painted_fails = self.fails;
            }
            bar.inc(1);
        }
    }

    /// Records one failure.
    pub fn fail(&mut self) {
        self.fails += 1;
    }

    /// Finalizes and clears the display. Counters remain readable.
    pub fn stop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    /// Attempts recorded so far in this batch.
    #[must_use]
    pub fn tries(&self) -> u64 {
        self.tries
    }

    /// Failures recorded so far in this batch.
    #[must_use]
    pub fn fails(&self) -> u64 {
        self.fails
    }
}
