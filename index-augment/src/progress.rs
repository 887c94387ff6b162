//! Scan progress reporting.
//!
//! `NoopProgress` for headless runs and tests, `IndicatifProgress` for a TTY.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

/// Minimal progress interface driven by the scanner.
pub trait Progress: Send + Sync {
    /// Known total (documents in the collection).
    fn set_total(&self, _n: u64) {}
    /// One more document enqueued.
    fn inc(&self) {}
    /// Finish the UI.
    fn finish(&self, _msg: &str) {}
}

/// No-op reporter.
#[derive(Default, Clone, Copy)]
pub struct NoopProgress;
impl Progress for NoopProgress {}

/// Indicatif bar on stderr.
pub struct IndicatifProgress {
    pb: ProgressBar,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta}) {msg}",
        ) {
            pb.set_style(style.progress_chars("##-"));
        }
        Self { pb }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for IndicatifProgress {
    fn set_total(&self, n: u64) {
        self.pb.set_length(n);
    }
    fn inc(&self) {
        self.pb.inc(1);
    }
    fn finish(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }
}

/// Bar when `enabled` and stderr is a terminal, no-op otherwise.
pub fn for_terminal(enabled: bool) -> Arc<dyn Progress> {
    if enabled && io::stderr().is_terminal() {
        Arc::new(IndicatifProgress::new())
    } else {
        Arc::new(NoopProgress)
    }
}
