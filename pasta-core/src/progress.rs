//! Progress reporting for the parallel scoring passes.
//!
//! Reporters are advanced from rayon workers, so implementations must be
//! `Send + Sync`. The CLI uses [`BarReporter`]; library callers and tests use
//! [`NoopReporter`].

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// A long-running pass over a known number of items.
pub trait ProgressReporter: Send + Sync {
    /// Begin a pass named `stage` over `total` items.
    fn start(&self, stage: &str, total: u64);

    /// Record `amount` finished items.
    fn advance(&self, amount: u64);

    fn finish(&self);
}

/// Reporter that discards everything.
#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn start(&self, _stage: &str, _total: u64) {}
    fn advance(&self, _amount: u64) {}
    fn finish(&self) {}
}

/// Progress bar on stderr, hidden when stderr is not a terminal.
#[derive(Debug)]
pub struct BarReporter {
    bar: ProgressBar,
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr()),
        }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl ProgressReporter for BarReporter {
    fn start(&self, stage: &str, total: u64) {
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({eta})")
        {
            self.bar.set_style(style.progress_chars("=> "));
        }
        self.bar.set_length(total);
        self.bar.set_message(stage.to_string());
        self.bar.reset();
    }

    fn advance(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
