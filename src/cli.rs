//! Command-line interface module for tidybox.
//!
//! This module turns parsed commands into session calls and prints the
//! results. It handles:
//! - Organize and preview (dry run)
//! - Undo of the last batch
//! - Category summaries
//! - An interactive shell that keeps one session across commands

use crate::analytics::{Summary, summarize_plan};
use crate::config::Config;
use crate::error::OrganizeError;
use crate::file_organizer::BatchReport;
use crate::output::OutputFormatter;
use crate::planner::Plan;
use crate::session::Session;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::debug;

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Organize files in a directory.
    Organize {
        /// If true, only show what would be moved.
        dry_run: bool,
        /// Print machine-readable JSON instead of tables.
        json: bool,
    },
    /// Undo the previous organization.
    Undo,
    /// Show per-category statistics for a directory.
    Summary { json: bool },
}

#[derive(Serialize)]
struct PreviewOutput<'a> {
    plan: &'a Plan,
    summary: Summary,
}

#[derive(Serialize)]
struct OrganizeOutput<'a> {
    report: &'a BatchReport,
    summary: Summary,
}

/// Runs a command against `dir_path` using the default configuration lookup.
///
/// # Examples
///
/// ```no_run
/// use tidybox::cli::{run_cli, OrganizeCommand};
/// use std::path::Path;
///
/// let command = OrganizeCommand::Organize { dry_run: false, json: false };
/// match run_cli(command, Path::new("/path/to/directory")) {
///     Ok(()) => println!("Operation completed successfully"),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(command: OrganizeCommand, dir_path: &Path) -> Result<(), String> {
    run_cli_with_config(command, dir_path, None)
}

/// Runs a command with an optional configuration file.
///
/// Each call opens a fresh session for `dir_path`; undo history carries over
/// between calls through the directory's journal.
pub fn run_cli_with_config(
    command: OrganizeCommand,
    dir_path: &Path,
    config_path: Option<&Path>,
) -> Result<(), String> {
    let mut session = open_session(dir_path, config_path)?;

    match command {
        OrganizeCommand::Organize { dry_run: true, json } => preview(&session, dir_path, json),
        OrganizeCommand::Organize {
            dry_run: false,
            json,
        } => organize(&mut session, dir_path, json),
        OrganizeCommand::Undo => undo(&mut session),
        OrganizeCommand::Summary { json } => summary(&session, dir_path, json),
    }
}

/// Runs an interactive session reading one command per line from `input`.
///
/// Commands: `preview`, `organize`, `undo`, `summary`, `help`, `quit`.
/// A failing command is reported and the shell keeps going.
pub fn run_shell<R: BufRead>(
    dir_path: &Path,
    config_path: Option<&Path>,
    input: R,
) -> Result<(), String> {
    let mut session = open_session(dir_path, config_path)?;
    OutputFormatter::info(&format!(
        "tidybox shell on {} (type 'help' for commands)",
        dir_path.display()
    ));

    prompt();
    for line in input.lines() {
        let line = line.map_err(|e| format!("Error reading input: {}", e))?;
        let command = line.trim();
        debug!("Shell command: {:?}", command);

        let result = match command {
            "" => Ok(()),
            "preview" => preview(&session, dir_path, false),
            "organize" => organize(&mut session, dir_path, false),
            "undo" => undo(&mut session),
            "summary" => session_summary(&session, dir_path),
            "help" => {
                OutputFormatter::plain("preview   show what organize would do");
                OutputFormatter::plain("organize  move files into category folders");
                OutputFormatter::plain("undo      move the last batch back");
                OutputFormatter::plain("summary   statistics for this session and directory");
                OutputFormatter::plain("quit      leave the shell");
                Ok(())
            }
            "quit" | "exit" => break,
            other => Err(format!("Unknown command '{}'", other)),
        };

        if let Err(e) = result {
            OutputFormatter::error(&e);
        }
        prompt();
    }

    Ok(())
}

fn prompt() {
    print!("tidybox> ");
    let _ = io::stdout().flush();
}

fn open_session(dir_path: &Path, config_path: Option<&Path>) -> Result<Session, String> {
    let config =
        Config::load(config_path).map_err(|e| format!("Error loading configuration: {}", e))?;
    Session::open(dir_path, config).map_err(|e| format!("Error: {}", e))
}

/// Shows the plan for `dir_path` without moving anything.
fn preview(session: &Session, dir_path: &Path, json: bool) -> Result<(), String> {
    let plan = session.plan(dir_path).map_err(|e| format!("Error: {}", e))?;

    if json {
        let output = PreviewOutput {
            summary: summarize_plan(&plan),
            plan: &plan,
        };
        return print_json(&output);
    }

    OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", plan.root().display()));
    if plan.is_empty() {
        OutputFormatter::info("No files found to organize.");
        return Ok(());
    }

    OutputFormatter::header("Files would be organized as follows:");
    OutputFormatter::plan_listing(&plan);
    OutputFormatter::summary_table(&summarize_plan(&plan));

    OutputFormatter::success("Dry run complete. No files were modified.");
    Ok(())
}

/// Plans and executes one batch for `dir_path`.
fn organize(session: &mut Session, dir_path: &Path, json: bool) -> Result<(), String> {
    let plan = session.plan(dir_path).map_err(|e| format!("Error: {}", e))?;

    if json {
        let report = session.execute(&plan);
        let output = OrganizeOutput {
            summary: summarize_plan(&plan),
            report: &report,
        };
        return print_json(&output);
    }

    OutputFormatter::info(&format!("Organizing contents of: {}", plan.root().display()));
    if plan.is_empty() {
        OutputFormatter::info("No files found to organize.");
    }

    let pb = OutputFormatter::create_progress_bar(plan.len() as u64);
    let root = plan.root().to_path_buf();
    let report = session.execute_with(&plan, |entry| {
        OutputFormatter::move_line(&pb, &root, entry);
        pb.inc(1);
    });
    pb.finish_and_clear();

    let mut moved = Summary::new();
    for entry in report.moved() {
        moved.add(entry.category, entry.size);
    }
    if !moved.is_empty() {
        OutputFormatter::summary_table(&moved);
    }
    OutputFormatter::batch_result(&report);

    if report.moved_count() > 0 {
        if session.config().organizer.journal {
            OutputFormatter::plain(&format!(
                "Use 'tidybox undo {}' to revert changes.",
                dir_path.display()
            ));
        } else {
            OutputFormatter::warning("The undo journal is disabled; this batch cannot be undone later.");
        }
    }
    Ok(())
}

/// Undoes the most recent batch.
fn undo(session: &mut Session) -> Result<(), String> {
    OutputFormatter::info("Undoing previous organization...");
    match session.undo_last_batch() {
        Ok(report) => {
            OutputFormatter::undo_result(&report);
            Ok(())
        }
        Err(OrganizeError::NothingToUndo) => {
            Err("Nothing to undo: no organization has been recorded".to_string())
        }
        Err(e) => Err(format!("Error: {}", e)),
    }
}

/// Prints statistics for the current contents of `dir_path`.
fn summary(session: &Session, dir_path: &Path, json: bool) -> Result<(), String> {
    let summary = session
        .summarize_directory(dir_path)
        .map_err(|e| format!("Error: {}", e))?;

    if json {
        return print_json(&summary);
    }

    OutputFormatter::info(&format!("Contents of: {}", dir_path.display()));
    OutputFormatter::summary_table(&summary);
    if !summary.is_empty() {
        OutputFormatter::size_histogram(&summary);
    }
    Ok(())
}

/// Shell variant of `summary`: what this session moved, then the directory.
fn session_summary(session: &Session, dir_path: &Path) -> Result<(), String> {
    let moved = session.summarize_log();
    if moved.is_empty() {
        OutputFormatter::info("Nothing moved in this session yet.");
    } else {
        OutputFormatter::header("MOVED IN THIS SESSION");
        OutputFormatter::summary_table(&moved);
    }
    summary(session, dir_path, false)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Error serializing output: {}", e))?;
    OutputFormatter::plain(&json);
    Ok(())
}
