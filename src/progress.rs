//! Progress bar for plan and apply runs

use colored::Colorize;
use declarative::{ChangeReport, Mode, Outcome, ProgressCallback, TaskKey};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;

const TEMPLATE: &str = "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

fn style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Renders engine progress as a single bar; hidden in quiet mode
pub struct TaskProgress {
    bar: ProgressBar,
    active: BTreeSet<TaskKey>,
}

impl TaskProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0).with_style(style())
        };
        Self {
            bar,
            active: BTreeSet::new(),
        }
    }

    fn show_active(&self) {
        let names: Vec<String> = self.active.iter().map(ToString::to_string).collect();
        self.bar.set_message(names.join(", "));
    }
}

fn symbol(outcome: &Outcome) -> colored::ColoredString {
    match outcome {
        Outcome::Applied | Outcome::WouldApply => "✓".green(),
        Outcome::NoOp => "○".dimmed(),
        Outcome::Warned => "⚠".yellow(),
        Outcome::Skipped { .. } => "⊘".yellow(),
        Outcome::Failed { .. } => "✗".red(),
    }
}

impl ProgressCallback for TaskProgress {
    fn on_run_start(&mut self, total: usize, mode: Mode) {
        self.bar.set_length(total as u64);
        self.bar.set_message(match mode {
            Mode::Plan => "Discovering...",
            Mode::Apply => "Applying...",
        });
    }

    fn on_task_start(&mut self, key: &TaskKey) {
        self.active.insert(key.clone());
        self.show_active();
    }

    fn on_task_complete(&mut self, key: &TaskKey, outcome: &Outcome) {
        self.active.remove(key);
        if matches!(outcome, Outcome::Failed { .. } | Outcome::Warned) {
            self.bar.println(format!("  {} {key}: {outcome}", symbol(outcome)));
        }
        self.bar.inc(1);
        self.show_active();
    }

    fn on_run_complete(&mut self, _report: &ChangeReport) {
        self.bar.finish_and_clear();
    }
}
