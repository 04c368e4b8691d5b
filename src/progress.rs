//! Terminal progress and confirmation for the executor

use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{ApplyResult, ConfirmCallback, ProgressCallback};

use crate::ui;

/// One progress bar per stage, with failures printed above it
pub struct BarProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl BarProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }
}

impl ProgressCallback for BarProgress {
    fn on_stage_start(&mut self, _stage: u8, count: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new(count as u64);
        let template = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    fn on_change_complete(&mut self, address: &str, result: &ApplyResult) {
        let line = match result {
            ApplyResult::Created { id } => format!("  {} {address} ({id})", "+".green()),
            ApplyResult::Updated { id } => format!("  {} {address} ({id})", "~".yellow()),
            ApplyResult::Deleted => format!("  {} {address}", "-".red()),
            ApplyResult::Failed { error } => {
                format!("  {} {address}: {}", "✗".red(), ui::truncate(error, 100))
            }
            ApplyResult::Unchanged { .. }
            | ApplyResult::AlreadyAbsent
            | ApplyResult::Skipped { .. } => String::new(),
        };

        match &self.bar {
            Some(bar) => {
                bar.set_message(address.to_string());
                if !line.is_empty() {
                    bar.suspend(|| println!("{line}"));
                }
                bar.inc(1);
            }
            None if !self.quiet && !line.is_empty() => println!("{line}"),
            None => {}
        }
    }

    fn on_stage_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Ask on the terminal
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                log::warn!("Could not prompt for confirmation: {e}");
                false
            })
    }
}
