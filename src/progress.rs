//! Progress reporting — a trait the core depends on, decoupled from any
//! concrete terminal UI. See §4.14.

use indicatif::{ProgressBar, ProgressStyle};

/// Progress sink the core reports against. The Orchestrator and Dispatcher
/// depend only on this trait, never on a concrete terminal implementation.
pub trait ProgressReporter: Send + Sync {
    fn set_total(&self, total: u64);
    fn inc(&self, delta: u64);
    fn set_message(&self, message: &str);
    fn finish(&self);
}

/// Terminal progress bar, used by the CLI.
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        TerminalProgress { bar }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for TerminalProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// No-op implementation used by library callers and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _message: &str) {}
    fn finish(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_progress_accepts_all_calls() {
        let progress = NoopProgress;
        progress.set_total(100);
        progress.inc(10);
        progress.set_message("working");
        progress.finish();
    }

    #[test]
    fn test_terminal_progress_tracks_position() {
        let progress = TerminalProgress::new();
        progress.set_total(10);
        progress.inc(3);
        assert_eq!(progress.bar.position(), 3);
        progress.finish();
    }
}
