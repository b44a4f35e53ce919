//! Undo functionality for reverting the most recent batch.
//!
//! Files are moved back in the reverse of the order they were moved. A file
//! is never restored over something that now occupies its original path;
//! such entries are reported as conflicts and stay eligible for a later
//! undo once the path is cleared.

use crate::activity_log::ReversalStatus;
use crate::error::{OrganizeError, OrganizeResult};
use crate::file_organizer::FileOrganizer;
use crate::move_log::{MoveLog, MoveLogEntry};
use crate::planner::path_exists;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Represents the result of an undo operation.
#[derive(Debug, Default, Serialize)]
pub struct UndoReport {
    /// `(from, to)` pairs of files moved back.
    pub restored: Vec<(PathBuf, PathBuf)>,
    /// Original paths that are occupied; these entries were left in place.
    pub conflicts: Vec<PathBuf>,
    /// Moved files that are no longer where the batch put them.
    pub missing: Vec<PathBuf>,
    /// Files that could not be moved back for any other reason.
    pub failed: Vec<(PathBuf, String)>,
    /// Empty category folders removed after restoring.
    pub pruned_dirs: Vec<PathBuf>,
    /// Set when the undo could not be written to the journal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_error: Option<String>,
}

impl UndoReport {
    pub fn restored_count(&self) -> usize {
        self.restored.len()
    }

    /// Returns the total number of entries processed.
    pub fn total_processed(&self) -> usize {
        self.restored.len() + self.conflicts.len() + self.missing.len() + self.failed.len()
    }

    /// Returns true if every pending entry was restored.
    pub fn is_complete_success(&self) -> bool {
        self.conflicts.is_empty() && self.missing.is_empty() && self.failed.is_empty()
    }

    /// True when there was nothing left to reverse.
    pub fn is_noop(&self) -> bool {
        self.total_processed() == 0
    }
}

/// Reverses batches recorded in a [`MoveLog`].
pub struct UndoManager;

impl UndoManager {
    /// Undoes the most recent batch in `log`.
    ///
    /// Only successful entries that have not been reversed yet are
    /// considered, so calling this again after a full undo is a no-op.
    /// `on_entry` is called once per processed entry with its outcome.
    ///
    /// # Edge Cases Handled
    ///
    /// * **Original path occupied**: reported as a conflict, nothing is overwritten
    /// * **File no longer at its destination**: reported as missing
    /// * **Original parent directory gone**: recreated before restoring
    /// * **No batch executed yet**: returns `NothingToUndo`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidybox::move_log::MoveLog;
    /// use tidybox::undo::UndoManager;
    ///
    /// let mut log = MoveLog::new();
    /// match UndoManager::undo_last_batch(&mut log, true, |_, _, _| {}) {
    ///     Ok(report) => println!("Restored {} files", report.restored_count()),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo_last_batch<F>(
        log: &mut MoveLog,
        prune_empty_dirs: bool,
        mut on_entry: F,
    ) -> OrganizeResult<UndoReport>
    where
        F: FnMut(&MoveLogEntry, ReversalStatus, Option<&str>),
    {
        if !log.has_batch() {
            return Err(OrganizeError::NothingToUndo);
        }

        let pending: Vec<MoveLogEntry> = log
            .last_batch()
            .iter()
            .rev()
            .filter(|entry| entry.is_undoable())
            .cloned()
            .collect();

        let mut report = UndoReport::default();
        if pending.is_empty() {
            debug!("Last batch has nothing left to undo");
            return Ok(report);
        }
        info!("Undoing {} moves", pending.len());

        for entry in &pending {
            match Self::restore_entry(entry) {
                Ok(()) => {
                    log.mark_reversed(entry.id, Utc::now());
                    debug!(
                        "Restored {} -> {}",
                        entry.destination.display(),
                        entry.source.display()
                    );
                    on_entry(entry, ReversalStatus::Reverted, None);
                    report
                        .restored
                        .push((entry.destination.clone(), entry.source.clone()));
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!("Could not restore {}: {}", entry.source.display(), message);
                    match err {
                        OrganizeError::Conflict { path } => {
                            on_entry(entry, ReversalStatus::Conflict, Some(&message));
                            report.conflicts.push(path);
                        }
                        OrganizeError::SourceMissing { path } => {
                            on_entry(entry, ReversalStatus::Missing, Some(&message));
                            report.missing.push(path);
                        }
                        _ => {
                            on_entry(entry, ReversalStatus::Failed, Some(&message));
                            report.failed.push((entry.destination.clone(), message));
                        }
                    }
                }
            }
        }

        if prune_empty_dirs
            && !report.restored.is_empty()
            && let Some(batch) = log.last_batch_info()
        {
            report.pruned_dirs = prune_dirs(&batch.created_dirs);
        }

        info!(
            "Undo finished: {} restored, {} conflicts, {} missing, {} failed",
            report.restored.len(),
            report.conflicts.len(),
            report.missing.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Moves one file back to its original location.
    fn restore_entry(entry: &MoveLogEntry) -> OrganizeResult<()> {
        if path_exists(&entry.source) {
            return Err(OrganizeError::Conflict {
                path: entry.source.clone(),
            });
        }
        if !path_exists(&entry.destination) {
            return Err(OrganizeError::SourceMissing {
                path: entry.destination.clone(),
            });
        }

        if let Some(parent) = entry.source.parent()
            && !parent.is_dir()
        {
            fs::create_dir_all(parent).map_err(|e| OrganizeError::from_io(parent, e))?;
        }

        FileOrganizer::relocate(&entry.destination, &entry.source)
    }
}

/// Removes the given directories if they are empty. Returns the ones removed.
fn prune_dirs(dirs: &[PathBuf]) -> Vec<PathBuf> {
    dirs.iter()
        .filter(|dir| is_empty_dir(dir))
        .filter(|dir| match fs::remove_dir(dir) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not remove {}: {}", dir.display(), e);
                false
            }
        })
        .cloned()
        .collect()
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
