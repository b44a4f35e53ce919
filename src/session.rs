//! Organizer session.
//!
//! A [`Session`] owns the move log and the configuration-derived planner.
//! Front ends (the CLI, the interactive shell, or anything embedding the
//! library) create one, call plan / execute / undo / summarize on it and
//! drop it when done. There is no global state.
//!
//! Operations take `&mut self`, so a plain `Session` can only run one at a
//! time. [`SharedSession`] wraps it for callers that share a session across
//! threads and want a `Busy` error instead of blocking.

use crate::activity_log::{ACTIVITY_LOG_FILE, ActivityLog};
use crate::analytics::{self, Summary};
use crate::config::Config;
use crate::error::{OrganizeError, OrganizeResult};
use crate::file_organizer::{BatchReport, FileOrganizer};
use crate::move_log::{JOURNAL_FILE, MoveLog, MoveLogEntry};
use crate::planner::{Plan, Planner, resolve_directory};
use crate::undo::{UndoManager, UndoReport};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tracing::{debug, info, warn};

/// Cooperative cancellation for a running batch.
///
/// The executor checks the flag before each entry; the entry in progress
/// always completes.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One organizer session: a move log plus the settings it was created with.
#[derive(Debug)]
pub struct Session {
    config: Config,
    planner: Planner,
    log: MoveLog,
    activity: Option<ActivityLog>,
    stop: StopFlag,
}

impl Session {
    /// Creates a session with an empty move log.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::Config` if the filters or category overrides are invalid.
    pub fn new(config: Config) -> OrganizeResult<Self> {
        let planner = Planner::from_config(&config)?;
        Ok(Self {
            config,
            planner,
            log: MoveLog::new(),
            activity: None,
            stop: StopFlag::new(),
        })
    }

    /// Creates a session for `dir`, restoring the last batch from its journal.
    ///
    /// # Errors
    ///
    /// * `DirectoryNotFound` / `PermissionDenied` - `dir` is unusable
    /// * `Journal` - the journal exists but cannot be read
    pub fn open(dir: &Path, config: Config) -> OrganizeResult<Self> {
        let mut session = Self::new(config)?;
        if session.config.organizer.journal {
            let root = resolve_directory(dir)?;
            if let Some(log) = MoveLog::load_journal(&root.join(JOURNAL_FILE))? {
                debug!(
                    "Restored {} journal entries for {}",
                    log.entries().len(),
                    root.display()
                );
                session.log = log;
            }
        }
        Ok(session)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log(&self) -> &MoveLog {
        &self.log
    }

    /// A handle that can stop the current (or next) batch from elsewhere.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Drops all in-memory undo history. The on-disk journal is left alone.
    pub fn reset(&mut self) {
        self.log = MoveLog::new();
        self.stop.reset();
    }

    /// Proposes moves for `dir` without touching anything.
    pub fn plan(&self, dir: &Path) -> OrganizeResult<Plan> {
        self.planner.plan(dir)
    }

    /// Executes `plan` as a new batch.
    pub fn execute(&mut self, plan: &Plan) -> BatchReport {
        self.execute_with(plan, |_| {})
    }

    /// Executes `plan`, calling `on_entry` after each move is logged.
    pub fn execute_with<F>(&mut self, plan: &Plan, mut on_entry: F) -> BatchReport
    where
        F: FnMut(&MoveLogEntry),
    {
        let mut activity = self.take_activity(plan.root());

        let mut report = FileOrganizer::execute(plan, &mut self.log, &self.stop, |entry| {
            if let Some(log) = activity.as_mut()
                && let Err(e) = log.record_move(entry)
            {
                warn!("Could not write activity log: {}", e);
            }
            on_entry(entry);
        });
        self.stop.reset();

        if let Some(log) = activity.as_mut() {
            let mut note = format!(
                "batch {}: {} moved, {} failed",
                report.batch_id,
                report.moved_count(),
                report.failed_count()
            );
            if report.stopped {
                note.push_str(&format!(", stopped with {} left", report.skipped));
            }
            if let Err(e) = log.note(&note) {
                warn!("Could not write activity log: {}", e);
            }
        }
        self.activity = activity;

        report.journal_error = self.save_journal(plan.root());
        report
    }

    /// Moves the files of the most recent batch back.
    ///
    /// # Errors
    ///
    /// Returns `NothingToUndo` if no batch has been executed in this session
    /// (or restored from a journal).
    pub fn undo_last_batch(&mut self) -> OrganizeResult<UndoReport> {
        let root = self
            .log
            .last_batch_info()
            .map(|batch| batch.root.clone())
            .ok_or(OrganizeError::NothingToUndo)?;

        let mut activity = self.take_activity(&root);
        let mut result = UndoManager::undo_last_batch(
            &mut self.log,
            self.config.organizer.prune_empty_dirs,
            |entry, status, detail| {
                if let Some(log) = activity.as_mut()
                    && let Err(e) = log.record_reversal(entry, status, detail)
                {
                    warn!("Could not write activity log: {}", e);
                }
            },
        );

        if let Ok(report) = &mut result
            && !report.is_noop()
        {
            if let Some(log) = activity.as_mut()
                && let Err(e) = log.note(&format!(
                    "undo: {} restored, {} conflicts, {} missing, {} failed",
                    report.restored_count(),
                    report.conflicts.len(),
                    report.missing.len(),
                    report.failed.len()
                ))
            {
                warn!("Could not write activity log: {}", e);
            }
            report.journal_error = self.save_journal(&root);
        }
        self.activity = activity;

        result
    }

    /// Statistics over the moves of this session that are still in place.
    pub fn summarize_log(&self) -> Summary {
        analytics::summarize_log(&self.log)
    }

    /// Statistics over the current contents of `dir`.
    pub fn summarize_directory(&self, dir: &Path) -> OrganizeResult<Summary> {
        analytics::summarize_directory(dir, &self.planner)
    }

    fn activity_log_path(&self, root: &Path) -> PathBuf {
        self.config
            .organizer
            .activity_log_path
            .clone()
            .unwrap_or_else(|| root.join(ACTIVITY_LOG_FILE))
    }

    /// Hands out the activity log for `root`, opening it if needed.
    fn take_activity(&mut self, root: &Path) -> Option<ActivityLog> {
        if !self.config.organizer.activity_log {
            return None;
        }

        let path = self.activity_log_path(root);
        if let Some(log) = self.activity.take()
            && log.path() == path
        {
            return Some(log);
        }

        match ActivityLog::open(&path) {
            Ok(log) => {
                info!("Writing activity log to {}", path.display());
                Some(log)
            }
            Err(e) => {
                warn!("Could not open activity log {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Writes the journal for `root`. Returns the reason if it could not be saved.
    fn save_journal(&self, root: &Path) -> Option<String> {
        if !self.config.organizer.journal {
            return None;
        }
        match self.log.save_journal(&root.join(JOURNAL_FILE)) {
            Ok(()) => None,
            Err(e) => {
                warn!("Could not save undo journal: {}", e);
                Some(e.to_string())
            }
        }
    }
}

/// A session shared between threads.
///
/// Every operation tries to take the session and fails with `Busy` instead
/// of waiting if another operation holds it.
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
    stop: StopFlag,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        let stop = session.stop_flag();
        Self {
            inner: Arc::new(Mutex::new(session)),
            stop,
        }
    }

    /// Stop handle that works while a batch holds the session.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn try_plan(&self, dir: &Path) -> OrganizeResult<Plan> {
        self.lock()?.plan(dir)
    }

    pub fn try_execute(&self, plan: &Plan) -> OrganizeResult<BatchReport> {
        Ok(self.lock()?.execute(plan))
    }

    pub fn try_execute_with<F>(&self, plan: &Plan, on_entry: F) -> OrganizeResult<BatchReport>
    where
        F: FnMut(&MoveLogEntry),
    {
        Ok(self.lock()?.execute_with(plan, on_entry))
    }

    pub fn try_undo(&self) -> OrganizeResult<UndoReport> {
        self.lock()?.undo_last_batch()
    }

    pub fn try_summarize_log(&self) -> OrganizeResult<Summary> {
        Ok(self.lock()?.summarize_log())
    }

    fn lock(&self) -> OrganizeResult<MutexGuard<'_, Session>> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(OrganizeError::Busy),
            // A panic mid-batch leaves the log consistent up to the last appended entry
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }
}
