//! Progress bars for reconciliation passes

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{PassOutcome, PassReport, ProgressCallback, ResourceKey, ResourceKind};

/// Draws one bar per kind batch and prints a line per resource
pub struct PassProgress {
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl PassProgress {
    pub fn new(verbose: bool) -> Self {
        Self { bar: None, verbose }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}

impl ProgressCallback for PassProgress {
    fn on_batch_start(&mut self, kind: ResourceKind, count: usize) {
        let bar = ProgressBar::new(count as u64);
        bar.set_style(Self::style());
        bar.set_message(format!("{kind} resources"));
        self.bar = Some(bar);
    }

    fn on_resource_complete(&mut self, key: &ResourceKey, result: &PassReport) {
        let line = match &result.outcome {
            Ok(PassOutcome::Created {
                statement_failed: false,
            }) => Some(format!("  {} {key} executed", "✓".green())),
            Ok(PassOutcome::Created {
                statement_failed: true,
            }) => Some(format!("  {} {key} statement failed", "✗".red())),
            Ok(PassOutcome::Deleted) => Some(format!("  {} {key} deleted", "−".yellow())),
            Ok(PassOutcome::UpToDate | PassOutcome::Updated) => {
                self.verbose.then(|| format!("  {} {key} up to date", "·".dimmed()))
            }
            Err(e) => Some(format!("  {} {key}: {e}", "⚠".yellow())),
        };
        if let Some(line) = line {
            self.println(line);
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
