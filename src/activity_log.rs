//! Human-readable activity log.
//!
//! One line per move or reversal, appended to a plain text file so it can
//! be tailed while an organize run is in progress. Every opening of the log
//! writes a session header first; the file is never truncated.

use crate::move_log::{MoveLogEntry, Outcome};
use chrono::{DateTime, Local, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default file name of the activity log inside an organized directory.
pub const ACTIVITY_LOG_FILE: &str = ".tidybox_activity.log";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Undo outcome for a single entry, as written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversalStatus {
    Reverted,
    Conflict,
    Missing,
    Failed,
}

impl ReversalStatus {
    fn label(&self) -> &'static str {
        match self {
            ReversalStatus::Reverted => "reverted",
            ReversalStatus::Conflict => "conflict",
            ReversalStatus::Missing => "missing",
            ReversalStatus::Failed => "failed",
        }
    }
}

/// Append-only writer for the activity log.
#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    file: File,
}

impl ActivityLog {
    /// Opens (or creates) the log in append mode and writes a session header.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut log = Self {
            path: path.to_path_buf(),
            file,
        };
        let now = Local::now().format(TIME_FORMAT);
        writeln!(log.file, "=== session started {} ===", now)?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the line for an executed move.
    pub fn record_move(&mut self, entry: &MoveLogEntry) -> io::Result<()> {
        let line = format_move(entry);
        writeln!(self.file, "{}", line)
    }

    /// Writes the line for an attempted reversal of `entry`.
    pub fn record_reversal(
        &mut self,
        entry: &MoveLogEntry,
        status: ReversalStatus,
        detail: Option<&str>,
    ) -> io::Result<()> {
        let mut line = format!(
            "{} | {:<8} | {:<9} | {} -> {}",
            local_time(Utc::now()),
            status.label(),
            entry.category.dir_name(),
            escaped(&entry.destination.to_string_lossy()),
            escaped(&entry.source.to_string_lossy())
        );
        if let Some(detail) = detail {
            line.push_str(" | ");
            line.push_str(&escaped(detail));
        }
        writeln!(self.file, "{}", line)
    }

    /// Writes a free-form note, e.g. a batch summary.
    pub fn note(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.file, "{} | {}", local_time(Utc::now()), escaped(message))
    }
}

fn local_time(when: DateTime<Utc>) -> String {
    when.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// Formats a move log entry as a single activity log line.
pub fn format_move(entry: &MoveLogEntry) -> String {
    let (status, detail) = match &entry.outcome {
        Outcome::Success => ("moved", None),
        Outcome::Failed { message, .. } => ("failed", Some(message.as_str())),
    };

    let mut line = format!(
        "{} | {:<8} | {:<9} | {} -> {}",
        local_time(entry.timestamp),
        status,
        entry.category.dir_name(),
        escaped(&entry.source.to_string_lossy()),
        escaped(&entry.destination.to_string_lossy())
    );
    if let Some(detail) = detail {
        line.push_str(" | ");
        line.push_str(&escaped(detail));
    }
    line
}

/// Escapes control characters so a file name cannot break a line in two.
fn escaped(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrganizeError;
    use crate::file_category::Category;
    use std::fs;
    use tempfile::TempDir;

    fn entry() -> MoveLogEntry {
        MoveLogEntry::success(
            PathBuf::from("/d/a.pdf"),
            PathBuf::from("/d/Documents/a.pdf"),
            Category::Documents,
            3,
        )
    }

    #[test]
    fn test_format_success_line() {
        let line = format_move(&entry());
        assert!(line.contains("| moved    |"));
        assert!(line.contains("Documents"));
        assert!(line.ends_with("/d/a.pdf -> /d/Documents/a.pdf"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_format_failure_line() {
        let err = OrganizeError::SourceMissing {
            path: PathBuf::from("/d/a.pdf"),
        };
        let failed = MoveLogEntry::failure(
            PathBuf::from("/d/a.pdf"),
            PathBuf::from("/d/Documents/a.pdf"),
            Category::Documents,
            0,
            &err,
        );
        let line = format_move(&failed);
        assert!(line.contains("| failed   |"));
        assert!(line.ends_with("| Source missing: /d/a.pdf"));
    }

    #[test]
    fn test_log_is_appended_across_sessions() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(ACTIVITY_LOG_FILE);

        {
            let mut log = ActivityLog::open(&path).expect("Failed to open log");
            log.record_move(&entry()).unwrap();
        }
        {
            let mut log = ActivityLog::open(&path).expect("Failed to reopen log");
            log.record_reversal(&entry(), ReversalStatus::Reverted, None)
                .unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("=== session started"));
        assert!(lines[1].contains("moved"));
        assert!(lines[2].starts_with("=== session started"));
        assert!(lines[3].contains("reverted"));
        assert!(lines[3].ends_with("/d/Documents/a.pdf -> /d/a.pdf"));
    }

    #[test]
    fn test_control_characters_stay_on_one_line() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(ACTIVITY_LOG_FILE);
        let odd = MoveLogEntry::success(
            PathBuf::from("/d/evil\nname.pdf"),
            PathBuf::from("/d/Documents/evil\nname.pdf"),
            Category::Documents,
            1,
        );

        {
            let mut log = ActivityLog::open(&path).expect("Failed to open log");
            log.record_move(&odd).unwrap();
            log.record_reversal(&odd, ReversalStatus::Conflict, Some("occupied:\r\n/d/x"))
                .unwrap();
            log.note("batch 1: 1 moved, 0 failed").unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("/d/evil\\nname.pdf -> /d/Documents/evil\\nname.pdf"));
        assert!(lines[2].ends_with("| occupied:\\r\\n/d/x"));
    }
}
