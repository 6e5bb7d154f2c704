//! Terminal implementations of the engine's progress and confirmation hooks

use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{ApplyResult, ConfirmCallback, Operation, ProgressCallback};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// Progress bar over the operations of one plan
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
    failures: Vec<String>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }
}

impl ProgressCallback for BarProgress {
    fn on_batch_start(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(Self::style());
        self.bar = Some(bar);
    }

    fn on_operation_start(&mut self, operation: &Operation) {
        if let Some(bar) = &self.bar {
            bar.set_message(operation.to_string());
        }
    }

    fn on_operation_complete(&mut self, operation: &Operation, result: &ApplyResult) {
        if let ApplyResult::Failed { error } = result {
            self.failures.push(format!("{operation}: {error}"));
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        for failure in self.failures.drain(..) {
            println!("  {} {}", "✗".red(), failure);
        }
    }
}

/// Interactive yes/no prompt
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool> {
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}
