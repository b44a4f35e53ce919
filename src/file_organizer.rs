//! Plan execution.
//!
//! This module moves files into their category directories according to a
//! [`Plan`]. Each entry is attempted independently: a failure is recorded in
//! the move log and the batch carries on with the next entry.

use crate::error::{OrganizeError, OrganizeResult};
use crate::move_log::{MoveLog, MoveLogEntry};
use crate::planner::{MovePlanEntry, Plan, disambiguate, path_exists};
use crate::session::StopFlag;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: u64,
    /// One log entry per attempted move, in plan order.
    pub entries: Vec<MoveLogEntry>,
    /// Plan entries never attempted because a stop was requested.
    pub skipped: usize,
    pub stopped: bool,
    /// Set when the batch could not be written to the undo journal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_error: Option<String>,
}

impl BatchReport {
    pub fn moved(&self) -> impl Iterator<Item = &MoveLogEntry> {
        self.entries.iter().filter(|e| e.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &MoveLogEntry> {
        self.entries.iter().filter(|e| !e.is_success())
    }

    pub fn moved_count(&self) -> usize {
        self.moved().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Bytes moved by the successful entries.
    pub fn bytes_moved(&self) -> u64 {
        self.moved().map(|e| e.size).sum()
    }

    pub fn is_complete_success(&self) -> bool {
        !self.stopped && self.failed_count() == 0
    }
}

/// Moves files into category subdirectories.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Executes every entry of `plan` as one batch.
    ///
    /// Starts a new batch in `log` (even for an empty plan, which then leaves
    /// nothing to undo) and appends one entry per attempted move. `on_entry`
    /// is called after each entry is logged. Checks `stop` before each entry;
    /// once it is set the remaining entries are left untouched.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidybox::file_organizer::FileOrganizer;
    /// use tidybox::move_log::MoveLog;
    /// use tidybox::planner::Planner;
    /// use tidybox::session::StopFlag;
    /// use std::path::Path;
    ///
    /// let plan = Planner::default().plan(Path::new("/path/to/downloads")).unwrap();
    /// let mut log = MoveLog::new();
    /// let report = FileOrganizer::execute(&plan, &mut log, &StopFlag::new(), |entry| {
    ///     println!("{} -> {}", entry.source.display(), entry.destination.display());
    /// });
    /// println!("{} moved, {} failed", report.moved_count(), report.failed_count());
    /// ```
    pub fn execute<F>(plan: &Plan, log: &mut MoveLog, stop: &StopFlag, mut on_entry: F) -> BatchReport
    where
        F: FnMut(&MoveLogEntry),
    {
        let batch_id = log.begin_batch(plan.root());
        info!(
            "Starting batch {} with {} moves in {}",
            batch_id,
            plan.len(),
            plan.root().display()
        );

        let mut report = BatchReport {
            batch_id,
            entries: Vec::with_capacity(plan.len()),
            skipped: 0,
            stopped: false,
            journal_error: None,
        };

        for (index, entry) in plan.iter().enumerate() {
            if stop.is_stopped() {
                report.stopped = true;
                report.skipped = plan.len() - index;
                info!("Stop requested, {} moves skipped", report.skipped);
                break;
            }

            let record = match Self::move_entry(entry, log) {
                Ok(destination) => {
                    debug!(
                        "Moved {} -> {}",
                        entry.source.display(),
                        destination.display()
                    );
                    MoveLogEntry::success(entry.source.clone(), destination, entry.category, entry.size)
                }
                Err((destination, err)) => {
                    warn!("Failed to move {}: {}", entry.source.display(), err);
                    MoveLogEntry::failure(
                        entry.source.clone(),
                        destination,
                        entry.category,
                        entry.size,
                        &err,
                    )
                }
            };

            let logged = log.append(record).clone();
            on_entry(&logged);
            report.entries.push(logged);
        }

        info!(
            "Batch {} finished: {} moved, {} failed",
            batch_id,
            report.moved_count(),
            report.failed_count()
        );
        report
    }

    /// Performs one planned move and returns where the file ended up.
    ///
    /// On failure the attempted destination is returned with the error.
    fn move_entry(
        entry: &MovePlanEntry,
        log: &mut MoveLog,
    ) -> Result<PathBuf, (PathBuf, OrganizeError)> {
        let fail = |err: OrganizeError| (entry.destination.clone(), err);

        if let Some(category_dir) = entry.destination.parent()
            && !category_dir.is_dir()
        {
            fs::create_dir_all(category_dir)
                .map_err(|e| fail(OrganizeError::from_io(category_dir, e)))?;
            debug!("Created {}", category_dir.display());
            log.record_created_dir(category_dir.to_path_buf());
        }

        // The file may have vanished since planning
        if !path_exists(&entry.source) {
            return Err(fail(OrganizeError::SourceMissing {
                path: entry.source.clone(),
            }));
        }

        let destination = if path_exists(&entry.destination) {
            let fresh = disambiguate(&entry.destination, path_exists);
            debug!(
                "{} appeared after planning, using {}",
                entry.destination.display(),
                fresh.display()
            );
            fresh
        } else {
            entry.destination.clone()
        };

        Self::relocate(&entry.source, &destination).map_err(|e| (destination.clone(), e))?;
        Ok(destination)
    }

    /// Moves `from` to `to` without ever replacing an existing `to`.
    ///
    /// On one volume the file is hard-linked under its new name and the old
    /// name is removed; creating the link fails if `to` exists. Across volumes
    /// the file is copied into a new file and the source removed afterwards.
    /// Filesystems without hard links get a rename after checking `to`.
    ///
    /// Neither path leaves two copies behind: if the source cannot be
    /// removed, the new name is removed again.
    pub fn relocate(from: &Path, to: &Path) -> OrganizeResult<()> {
        match fs::hard_link(from, to) {
            Ok(()) => remove_source(from, to, |path| fs::remove_file(path))
                .map_err(|e| OrganizeError::from_io(from, e)),
            Err(e) => match e.kind() {
                io::ErrorKind::AlreadyExists => Err(OrganizeError::Conflict {
                    path: to.to_path_buf(),
                }),
                io::ErrorKind::NotFound => Err(OrganizeError::from_io(from, e)),
                io::ErrorKind::CrossesDevices => {
                    debug!(
                        "{} and {} are on different volumes, copying",
                        from.display(),
                        to.display()
                    );
                    Self::copy_then_remove(from, to)
                }
                _ => {
                    debug!("Could not link {} ({}), renaming", from.display(), e);
                    Self::rename_new(from, to)
                }
            },
        }
    }

    fn rename_new(from: &Path, to: &Path) -> OrganizeResult<()> {
        if path_exists(to) {
            return Err(OrganizeError::Conflict {
                path: to.to_path_buf(),
            });
        }
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => Self::copy_then_remove(from, to),
            Err(e) => Err(OrganizeError::from_io(from, e)),
        }
    }

    pub(crate) fn copy_then_remove(from: &Path, to: &Path) -> OrganizeResult<()> {
        Self::copy_then_remove_with(from, to, |path| fs::remove_file(path))
    }

    /// Copy fallback with the removal of the source supplied by the caller.
    pub(crate) fn copy_then_remove_with<R>(from: &Path, to: &Path, remove: R) -> OrganizeResult<()>
    where
        R: FnOnce(&Path) -> io::Result<()>,
    {
        copy_file(from, to).map_err(|e| match e.kind() {
            io::ErrorKind::StorageFull => OrganizeError::DiskFull {
                path: to.to_path_buf(),
            },
            _ => OrganizeError::CrossVolumeCopy {
                path: from.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        remove_source(from, to, remove).map_err(|e| OrganizeError::CrossVolumeCopy {
            path: from.to_path_buf(),
            reason: format!("could not remove source after copying: {}", e),
        })
    }
}

/// Removes `from` once `to` holds the file. On failure `to` is removed again.
fn remove_source<R>(from: &Path, to: &Path, remove: R) -> io::Result<()>
where
    R: FnOnce(&Path) -> io::Result<()>,
{
    let result = remove(from);
    if result.is_err()
        && let Err(cleanup) = fs::remove_file(to)
    {
        warn!("Could not remove {}: {}", to.display(), cleanup);
    }
    result
}

/// Copies contents and permissions into a new file, removing it on failure.
fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
    let mut reader = File::open(from)?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(to)?;

    let result = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.sync_all())
        .and_then(|_| reader.metadata())
        .and_then(|metadata| fs::set_permissions(to, metadata.permissions()));

    if result.is_err() {
        drop(writer);
        if let Err(cleanup) = fs::remove_file(to) {
            warn!("Could not remove partial copy {}: {}", to.display(), cleanup);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::Category;
    use crate::move_log::FailureKind;
    use crate::planner::Planner;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).expect("Failed to write test file");
    }

    fn run(plan: &Plan, log: &mut MoveLog) -> BatchReport {
        FileOrganizer::execute(plan, log, &StopFlag::new(), |_| {})
    }

    #[test]
    fn test_execute_creates_category_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "test.txt", "test content");
        write(base, "photo.png", "png");

        let plan = Planner::default().plan(base).expect("Failed to plan");
        let mut log = MoveLog::new();
        let report = run(&plan, &mut log);

        assert!(report.is_complete_success());
        assert_eq!(report.moved_count(), 2);
        assert!(!base.join("test.txt").exists());
        assert!(base.join("Documents/test.txt").exists());
        assert!(base.join("Images/photo.png").exists());
        assert_eq!(
            fs::read_to_string(base.join("Documents/test.txt")).unwrap(),
            "test content"
        );

        let created = &log.last_batch_info().unwrap().created_dirs;
        assert_eq!(created.len(), 2);
    }

    #[test]
    fn test_execute_uses_existing_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::create_dir(base.join("Images")).unwrap();
        write(base, "test.png", "x");

        let plan = Planner::default().plan(base).expect("Failed to plan");
        let mut log = MoveLog::new();
        run(&plan, &mut log);

        assert!(base.join("Images/test.png").exists());
        assert!(log.last_batch_info().unwrap().created_dirs.is_empty());
    }

    #[test]
    fn test_execute_records_missing_source_and_continues() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "a.txt", "a");
        write(base, "b.txt", "b");
        write(base, "c.txt", "c");

        let plan = Planner::default().plan(base).expect("Failed to plan");
        fs::remove_file(base.join("b.txt")).unwrap();

        let mut log = MoveLog::new();
        let report = run(&plan, &mut log);

        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.moved_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(
            report.entries[1].failure_kind(),
            Some(FailureKind::SourceMissing)
        );
        assert!(base.join("Documents/a.txt").exists());
        assert!(base.join("Documents/c.txt").exists());
        assert!(!report.is_complete_success());
    }

    #[test]
    fn test_execute_redisambiguates_late_collisions() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "report.pdf", "mine");

        let plan = Planner::default().plan(base).expect("Failed to plan");
        // Someone else drops a file on the planned destination
        fs::create_dir(base.join("Documents")).unwrap();
        write(&base.join("Documents"), "report.pdf", "theirs");

        let mut log = MoveLog::new();
        let report = run(&plan, &mut log);

        assert!(report.is_complete_success());
        assert!(report.entries[0].destination.ends_with("Documents/report (1).pdf"));
        assert_eq!(
            fs::read_to_string(base.join("Documents/report.pdf")).unwrap(),
            "theirs"
        );
        assert_eq!(
            fs::read_to_string(base.join("Documents/report (1).pdf")).unwrap(),
            "mine"
        );
    }

    #[test]
    fn test_execute_honours_stop_flag() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "a.txt", "a");
        write(base, "b.txt", "b");
        write(base, "c.txt", "c");

        let plan = Planner::default().plan(base).expect("Failed to plan");
        let stop = StopFlag::new();
        let mut log = MoveLog::new();
        let report = FileOrganizer::execute(&plan, &mut log, &stop, |_| stop.request_stop());

        assert!(report.stopped);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.skipped, 2);
        assert!(base.join("b.txt").exists());
        assert!(base.join("c.txt").exists());
    }

    #[test]
    fn test_execute_empty_plan_opens_empty_batch() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let plan = Planner::default().plan(temp_dir.path()).expect("Failed to plan");

        let mut log = MoveLog::new();
        let report = run(&plan, &mut log);

        assert!(report.entries.is_empty());
        assert!(log.has_batch());
        assert!(log.last_batch().is_empty());
    }

    #[test]
    fn test_execute_callback_sees_logged_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "song.mp3", "x");

        let plan = Planner::default().plan(base).expect("Failed to plan");
        let mut log = MoveLog::new();
        let mut seen = Vec::new();
        FileOrganizer::execute(&plan, &mut log, &StopFlag::new(), |e| {
            seen.push((e.id, e.category))
        });

        assert_eq!(seen, vec![(1, Category::Audio)]);
    }

    #[test]
    fn test_relocate_missing_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let result = FileOrganizer::relocate(&base.join("nope.txt"), &base.join("to.txt"));
        assert!(matches!(result, Err(OrganizeError::SourceMissing { .. })));
    }

    #[test]
    fn test_copy_fallback_moves_contents() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "from.bin", "payload");

        FileOrganizer::copy_then_remove(&base.join("from.bin"), &base.join("to.bin"))
            .expect("Copy fallback failed");

        assert!(!base.join("from.bin").exists());
        assert_eq!(fs::read_to_string(base.join("to.bin")).unwrap(), "payload");
    }

    #[test]
    fn test_copy_fallback_never_overwrites() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "from.bin", "payload");
        write(base, "to.bin", "existing");

        let result = FileOrganizer::copy_then_remove(&base.join("from.bin"), &base.join("to.bin"));

        assert!(matches!(result, Err(OrganizeError::CrossVolumeCopy { .. })));
        assert_eq!(fs::read_to_string(base.join("from.bin")).unwrap(), "payload");
        assert_eq!(fs::read_to_string(base.join("to.bin")).unwrap(), "existing");
    }

    #[test]
    fn test_relocate_never_replaces_existing_target() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "from.txt", "mine");
        write(base, "to.txt", "theirs");

        let result = FileOrganizer::relocate(&base.join("from.txt"), &base.join("to.txt"));

        assert!(matches!(result, Err(OrganizeError::Conflict { .. })));
        assert_eq!(fs::read_to_string(base.join("from.txt")).unwrap(), "mine");
        assert_eq!(fs::read_to_string(base.join("to.txt")).unwrap(), "theirs");
    }

    #[test]
    fn test_relocate_leaves_a_single_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "from.txt", "payload");

        FileOrganizer::relocate(&base.join("from.txt"), &base.join("to.txt"))
            .expect("Relocate failed");

        assert!(!base.join("from.txt").exists());
        assert_eq!(fs::read_to_string(base.join("to.txt")).unwrap(), "payload");
    }

    #[test]
    fn test_copy_fallback_rolls_back_when_source_stays() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        write(base, "from.bin", "payload");

        let result = FileOrganizer::copy_then_remove_with(
            &base.join("from.bin"),
            &base.join("to.bin"),
            |_| Err(io::Error::from(io::ErrorKind::PermissionDenied)),
        );

        match result {
            Err(OrganizeError::CrossVolumeCopy { reason, .. }) => {
                assert!(reason.contains("could not remove source"));
            }
            other => panic!("Expected CrossVolumeCopy, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(base.join("from.bin")).unwrap(), "payload");
        assert!(!base.join("to.bin").exists());
    }
}
