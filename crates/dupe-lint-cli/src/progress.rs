use dupe_lint_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Hash phase: bar over the distinct catalog paths
/// - Consolidation phase: bar over the duplicate groups
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, total: usize, label: &str, unit: &str) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(&format!(
                "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {} ({{eta}} remaining)",
                label, unit
            ))
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars(TICKS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));

        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.replace(pb) {
            old.finish_and_clear();
        }
    }

    fn set_position(&self, done: usize, total: usize) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            if pb.length() != Some(total as u64) {
                pb.set_length(total as u64);
            }
            pb.set_position(done as u64);
        }
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_hash_start(&self, total_files: usize) {
        self.start_bar(total_files, "Hashing", "files");
    }

    fn on_hash_progress(&self, files_hashed: usize, total_files: usize) {
        self.set_position(files_hashed, total_files);
    }

    fn on_hash_complete(&self, duplicate_groups: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Hash complete: {} duplicate groups in {:.2}s",
            duplicate_groups, duration_secs
        );
    }

    fn on_consolidate_start(&self, total_groups: usize) {
        self.start_bar(total_groups, "Merging", "groups");
    }

    fn on_group_complete(&self, groups_done: usize, total_groups: usize) {
        self.set_position(groups_done, total_groups);
    }

    fn on_consolidate_complete(&self, files_deleted: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Consolidation complete: {} files deleted in {:.2}s",
            files_deleted, duration_secs
        );
    }
}
