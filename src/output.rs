//! Output formatting and styling module.
//!
//! All terminal output of the CLI and the interactive shell goes through
//! [`OutputFormatter`], so colors and layout are decided in one place.

use crate::analytics::{Summary, format_size};
use crate::file_organizer::BatchReport;
use crate::move_log::MoveLogEntry;
use crate::planner::Plan;
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Progress bars and summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidybox::output::OutputFormatter;
    /// OutputFormatter::success("Moved 12 files");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for a batch of `total` moves.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidybox::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints the planned moves, one per line, relative to the plan root.
    pub fn plan_listing(plan: &Plan) {
        let root = plan.root();
        for entry in plan.iter() {
            println!(
                "  {} {} {}",
                relative(root, &entry.source),
                "→".cyan(),
                relative(root, &entry.destination).green()
            );
        }
    }

    /// Prints a single executed move, above any active progress bar.
    pub fn move_line(pb: &ProgressBar, root: &Path, entry: &MoveLogEntry) {
        let line = match entry.failure_kind() {
            None => format!(
                "{} {} → {}",
                "✓".green(),
                relative(root, &entry.source),
                relative(root, &entry.destination)
            ),
            Some(kind) => format!(
                "{} {} ({})",
                "✗".red(),
                relative(root, &entry.source),
                kind.label()
            ),
        };
        pb.println(line);
    }

    /// Prints the per-batch outcome line and any failures.
    pub fn batch_result(report: &BatchReport) {
        let moved = report.moved_count();
        let failed = report.failed_count();
        let line = format!(
            "{} moved, {} failed ({})",
            moved,
            failed,
            format_size(report.bytes_moved())
        );

        if failed == 0 {
            Self::success(&line);
        } else {
            Self::warning(&line);
            for entry in report.failed() {
                if let crate::move_log::Outcome::Failed { message, .. } = &entry.outcome {
                    Self::error(&format!("{}: {}", entry.source.display(), message));
                }
            }
        }
        if report.stopped {
            Self::warning(&format!("Stopped early, {} files left untouched", report.skipped));
        }
        if let Some(reason) = &report.journal_error {
            Self::warning(&format!(
                "Undo journal not saved ({}); this batch can only be undone from the same session",
                reason
            ));
        }
    }

    /// Prints what an undo did.
    pub fn undo_result(report: &UndoReport) {
        if report.is_noop() {
            Self::info("Nothing left to undo in the last batch");
            return;
        }

        Self::success(&format!("Restored {} files", report.restored_count()));
        for path in &report.conflicts {
            Self::warning(&format!(
                "{} is occupied, left the moved file in place",
                path.display()
            ));
        }
        for path in &report.missing {
            Self::warning(&format!("{} no longer exists", path.display()));
        }
        for (path, reason) in &report.failed {
            Self::error(&format!("{}: {}", path.display(), reason));
        }
        if !report.pruned_dirs.is_empty() {
            Self::info(&format!(
                "Removed {} empty category folders",
                report.pruned_dirs.len()
            ));
        }
        if let Some(reason) = &report.journal_error {
            Self::warning(&format!("Undo journal not updated ({})", reason));
        }
    }

    /// Prints a summary table with file counts and sizes by category.
    ///
    /// Empty categories are left out; the total row always appears.
    pub fn summary_table(summary: &Summary) {
        Self::header("SUMMARY");

        let rows: Vec<_> = summary
            .by_category
            .iter()
            .filter(|(_, stats)| stats.count > 0)
            .collect();

        let width = rows
            .iter()
            .map(|(category, _)| category.dir_name().len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {:>7} | {}",
            "Category".bold(),
            "Files".bold(),
            "Size".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 24));

        for (category, stats) in &rows {
            println!(
                "{:<width$} | {:>7} | {}",
                category.dir_name(),
                stats.count.to_string().green(),
                format_size(stats.total_size),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 24));
        println!(
            "{:<width$} | {:>7} | {}",
            "Total".bold(),
            summary.total_files().to_string().green().bold(),
            format_size(summary.total_size()),
            width = width
        );
    }

    /// Prints the size histogram as a bar chart.
    pub fn size_histogram(summary: &Summary) {
        Self::header("SIZE DISTRIBUTION");

        let max = summary
            .size_distribution
            .iter()
            .map(|bucket| bucket.count)
            .max()
            .unwrap_or(0);

        for bucket in &summary.size_distribution {
            let bar_len = if max == 0 {
                0
            } else {
                (bucket.count * 30).div_ceil(max) as usize
            };
            println!(
                "{:>14} | {} {}",
                bucket.label,
                "█".repeat(bar_len).cyan(),
                bucket.count
            );
        }
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
