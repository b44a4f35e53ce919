//! Session record of executed moves.
//!
//! The log is append-only: entries are never reordered or removed. Undo
//! flips a `reversed_at` timestamp on the entries it restores. Only the most
//! recent batch is eligible for undo, and only that batch is written to the
//! on-disk journal.

use crate::error::{OrganizeError, OrganizeResult};
use crate::file_category::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Name of the journal file kept in an organized directory.
pub const JOURNAL_FILE: &str = ".tidybox_journal.json";

/// Name the journal is written under before it replaces [`JOURNAL_FILE`].
pub const JOURNAL_TEMP_FILE: &str = ".tidybox_journal.json.tmp";

const JOURNAL_VERSION: u32 = 1;

/// Why a move (or its reversal) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SourceMissing,
    PermissionDenied,
    DiskFull,
    CrossVolumeCopy,
    Conflict,
    Other,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::SourceMissing => "source missing",
            FailureKind::PermissionDenied => "permission denied",
            FailureKind::DiskFull => "disk full",
            FailureKind::CrossVolumeCopy => "cross-volume copy failed",
            FailureKind::Conflict => "conflict",
            FailureKind::Other => "error",
        }
    }
}

/// Result of a single move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed { kind: FailureKind, message: String },
}

/// One executed (or attempted) move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLogEntry {
    /// Session-unique, increasing entry id.
    pub id: u64,
    /// Batch (execute call) this entry belongs to.
    pub batch_id: u64,
    pub timestamp: DateTime<Utc>,
    /// Where the file was before the move.
    #[serde(with = "path_repr")]
    pub source: PathBuf,
    /// Where the file ended up, after any disambiguation.
    #[serde(with = "path_repr")]
    pub destination: PathBuf,
    pub category: Category,
    pub size: u64,
    pub outcome: Outcome,
    /// Set once undo has moved the file back.
    #[serde(default)]
    pub reversed_at: Option<DateTime<Utc>>,
}

impl MoveLogEntry {
    /// A successful move. Ids are assigned by [`MoveLog::append`].
    pub fn success(source: PathBuf, destination: PathBuf, category: Category, size: u64) -> Self {
        Self {
            id: 0,
            batch_id: 0,
            timestamp: Utc::now(),
            source,
            destination,
            category,
            size,
            outcome: Outcome::Success,
            reversed_at: None,
        }
    }

    /// A failed move, classified from the error that caused it.
    pub fn failure(
        source: PathBuf,
        destination: PathBuf,
        category: Category,
        size: u64,
        error: &OrganizeError,
    ) -> Self {
        Self {
            outcome: Outcome::Failed {
                kind: error.kind(),
                message: error.to_string(),
            },
            ..Self::success(source, destination, category, size)
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed_at.is_some()
    }

    /// Successful and not yet reversed.
    pub fn is_undoable(&self) -> bool {
        self.is_success() && !self.is_reversed()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Bookkeeping for the most recent batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInfo {
    pub id: u64,
    /// The directory that was organized.
    #[serde(with = "path_repr")]
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Index of the batch's first entry in the log.
    start: usize,
    /// Category folders this batch had to create.
    #[serde(with = "path_repr::list")]
    pub created_dirs: Vec<PathBuf>,
}

/// Append-only log of moves for one session.
#[derive(Debug, Clone, Default)]
pub struct MoveLog {
    entries: Vec<MoveLogEntry>,
    last_batch: Option<BatchInfo>,
    next_entry_id: u64,
    next_batch_id: u64,
}

#[derive(Serialize, Deserialize)]
struct Journal {
    version: u32,
    batch: BatchInfo,
    entries: Vec<MoveLogEntry>,
}

impl MoveLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new batch, superseding the previous one for undo purposes.
    pub fn begin_batch(&mut self, root: &Path) -> u64 {
        self.next_batch_id += 1;
        let id = self.next_batch_id;
        self.last_batch = Some(BatchInfo {
            id,
            root: root.to_path_buf(),
            started_at: Utc::now(),
            start: self.entries.len(),
            created_dirs: Vec::new(),
        });
        id
    }

    /// Appends an entry to the current batch, stamping its id and batch id.
    ///
    /// A batch is opened implicitly if none has been started yet.
    pub fn append(&mut self, mut entry: MoveLogEntry) -> &MoveLogEntry {
        let batch_id = match &self.last_batch {
            Some(batch) => batch.id,
            None => {
                let root = entry
                    .source
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                self.begin_batch(&root)
            }
        };

        self.next_entry_id += 1;
        entry.id = self.next_entry_id;
        entry.batch_id = batch_id;
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Records a category folder created during the current batch.
    pub fn record_created_dir(&mut self, dir: PathBuf) {
        if let Some(batch) = &mut self.last_batch
            && !batch.created_dirs.contains(&dir)
        {
            batch.created_dirs.push(dir);
        }
    }

    /// All entries, in execution order.
    pub fn entries(&self) -> &[MoveLogEntry] {
        &self.entries
    }

    /// Entries of the most recent batch, in execution order.
    pub fn last_batch(&self) -> &[MoveLogEntry] {
        match &self.last_batch {
            Some(batch) => &self.entries[batch.start..],
            None => &[],
        }
    }

    pub fn last_batch_info(&self) -> Option<&BatchInfo> {
        self.last_batch.as_ref()
    }

    pub fn has_batch(&self) -> bool {
        self.last_batch.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flags an entry of the last batch as reversed. Returns `false` if the
    /// entry is not in the last batch or was already reversed.
    pub fn mark_reversed(&mut self, entry_id: u64, when: DateTime<Utc>) -> bool {
        let start = match &self.last_batch {
            Some(batch) => batch.start,
            None => return false,
        };
        match self.entries[start..]
            .iter_mut()
            .find(|entry| entry.id == entry_id)
        {
            Some(entry) if entry.reversed_at.is_none() => {
                entry.reversed_at = Some(when);
                true
            }
            _ => false,
        }
    }

    /// Writes the last batch to `path` as JSON.
    ///
    /// The journal is written to a temporary file first and then renamed over
    /// `path`. If that fails, an existing journal at `path` is removed, since
    /// it describes a batch that is no longer the last one. Does nothing when
    /// no batch has been executed.
    pub fn save_journal(&self, path: &Path) -> OrganizeResult<()> {
        let Some(batch) = &self.last_batch else {
            return Ok(());
        };

        let journal = Journal {
            version: JOURNAL_VERSION,
            batch: BatchInfo {
                start: 0,
                ..batch.clone()
            },
            entries: self.last_batch().to_vec(),
        };

        let result = serde_json::to_string_pretty(&journal)
            .map_err(|e| format!("JSON serialization failed: {}", e))
            .and_then(|json| write_replacing(path, &json).map_err(|e| e.to_string()));

        result.map_err(|reason| {
            let reason = match discard_stale_journal(path) {
                Ok(()) => reason,
                Err(e) => format!("{}; the previous journal could not be removed: {}", reason, e),
            };
            OrganizeError::Journal {
                path: path.to_path_buf(),
                reason,
            }
        })
    }

    /// Restores a log holding the journaled batch, or `None` if there is no journal.
    pub fn load_journal(path: &Path) -> OrganizeResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(path).map_err(|e| OrganizeError::Journal {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let journal: Journal = serde_json::from_str(&json).map_err(|e| OrganizeError::Journal {
            path: path.to_path_buf(),
            reason: format!("JSON parse error: {}", e),
        })?;

        if journal.version != JOURNAL_VERSION {
            return Err(OrganizeError::Journal {
                path: path.to_path_buf(),
                reason: format!("unsupported journal version {}", journal.version),
            });
        }

        let next_entry_id = journal.entries.iter().map(|e| e.id).max().unwrap_or(0);
        Ok(Some(Self {
            next_entry_id,
            next_batch_id: journal.batch.id,
            last_batch: Some(BatchInfo {
                start: 0,
                ..journal.batch
            }),
            entries: journal.entries,
        }))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_replacing(path: &Path, contents: &str) -> io::Result<()> {
    let tmp = temp_path(path);
    let result = fs::write(&tmp, contents).and_then(|_| fs::rename(&tmp, path));
    if result.is_err()
        && let Err(e) = fs::remove_file(&tmp)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!("Could not remove {}: {}", tmp.display(), e);
    }
    result
}

fn discard_stale_journal(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            warn!("Removed stale journal {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Serde encoding for paths that keeps names which are not valid UTF-8.
///
/// UTF-8 paths are stored as plain strings. Anything else is stored as the
/// platform's raw encoding: `{"raw": [bytes]}` on Unix, `{"wide": [u16]}` on
/// Windows.
pub(crate) mod path_repr {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::path::{Path, PathBuf};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Raw { raw: Vec<u8> },
        Wide { wide: Vec<u16> },
    }

    fn to_repr(path: &Path) -> Repr {
        match path.to_str() {
            Some(text) => Repr::Text(text.to_string()),
            None => native(path),
        }
    }

    #[cfg(unix)]
    fn native(path: &Path) -> Repr {
        use std::os::unix::ffi::OsStrExt;
        Repr::Raw {
            raw: path.as_os_str().as_bytes().to_vec(),
        }
    }

    #[cfg(windows)]
    fn native(path: &Path) -> Repr {
        use std::os::windows::ffi::OsStrExt;
        Repr::Wide {
            wide: path.as_os_str().encode_wide().collect(),
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn native(path: &Path) -> Repr {
        Repr::Text(path.to_string_lossy().into_owned())
    }

    fn from_repr(repr: Repr) -> Result<PathBuf, &'static str> {
        match repr {
            Repr::Text(text) => Ok(PathBuf::from(text)),
            Repr::Raw { raw } => from_raw(raw),
            Repr::Wide { wide } => from_wide(wide),
        }
    }

    #[cfg(unix)]
    fn from_raw(raw: Vec<u8>) -> Result<PathBuf, &'static str> {
        use std::os::unix::ffi::OsStringExt;
        Ok(PathBuf::from(std::ffi::OsString::from_vec(raw)))
    }

    #[cfg(not(unix))]
    fn from_raw(_: Vec<u8>) -> Result<PathBuf, &'static str> {
        Err("byte-encoded path written on another platform")
    }

    #[cfg(windows)]
    fn from_wide(wide: Vec<u16>) -> Result<PathBuf, &'static str> {
        use std::os::windows::ffi::OsStringExt;
        Ok(PathBuf::from(std::ffi::OsString::from_wide(&wide)))
    }

    #[cfg(not(windows))]
    fn from_wide(_: Vec<u16>) -> Result<PathBuf, &'static str> {
        Err("UTF-16 path written on another platform")
    }

    pub fn serialize<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
        to_repr(path).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
        from_repr(Repr::deserialize(deserializer)?).map_err(D::Error::custom)
    }

    pub mod list {
        use super::*;
        use serde::de::Error as _;

        pub fn serialize<S: Serializer>(paths: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(paths.iter().map(|path| to_repr(path)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<PathBuf>, D::Error> {
            Vec::<Repr>::deserialize(deserializer)?
                .into_iter()
                .map(|repr| from_repr(repr).map_err(D::Error::custom))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn moved(name: &str) -> MoveLogEntry {
        MoveLogEntry::success(
            PathBuf::from(format!("/d/{}", name)),
            PathBuf::from(format!("/d/Documents/{}", name)),
            Category::Documents,
            10,
        )
    }

    #[test]
    fn test_append_assigns_ids_and_batches() {
        let mut log = MoveLog::new();
        let first = log.begin_batch(Path::new("/d"));
        log.append(moved("a.txt"));
        log.append(moved("b.txt"));
        let second = log.begin_batch(Path::new("/d"));
        log.append(moved("c.txt"));

        assert_ne!(first, second);
        assert_eq!(log.entries().len(), 3);
        let ids: Vec<_> = log.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(log.last_batch().len(), 1);
        assert_eq!(log.last_batch()[0].batch_id, second);
        assert_eq!(log.entries()[0].batch_id, first);
    }

    #[test]
    fn test_empty_batch_supersedes_previous() {
        let mut log = MoveLog::new();
        log.begin_batch(Path::new("/d"));
        log.append(moved("a.txt"));
        log.begin_batch(Path::new("/d"));

        assert!(log.has_batch());
        assert!(log.last_batch().is_empty());
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn test_append_without_batch_opens_one() {
        let mut log = MoveLog::new();
        log.append(moved("a.txt"));
        assert!(log.has_batch());
        assert_eq!(log.last_batch_info().unwrap().root, PathBuf::from("/d"));
    }

    #[test]
    fn test_mark_reversed_only_once_and_only_last_batch() {
        let mut log = MoveLog::new();
        log.begin_batch(Path::new("/d"));
        let old_id = log.append(moved("a.txt")).id;
        log.begin_batch(Path::new("/d"));
        let id = log.append(moved("b.txt")).id;

        assert!(!log.mark_reversed(old_id, Utc::now()));
        assert!(log.mark_reversed(id, Utc::now()));
        assert!(!log.mark_reversed(id, Utc::now()));
        assert!(log.last_batch()[0].is_reversed());
        assert!(!log.last_batch()[0].is_undoable());
        // History is kept after reversal
        assert_eq!(log.entries().len(), 2);
    }

    #[test]
    fn test_failure_entry_carries_kind() {
        let err = OrganizeError::SourceMissing {
            path: PathBuf::from("/d/gone.txt"),
        };
        let entry = MoveLogEntry::failure(
            PathBuf::from("/d/gone.txt"),
            PathBuf::from("/d/Documents/gone.txt"),
            Category::Documents,
            0,
            &err,
        );
        assert!(!entry.is_success());
        assert!(!entry.is_undoable());
        assert_eq!(entry.failure_kind(), Some(FailureKind::SourceMissing));
    }

    #[test]
    fn test_journal_keeps_only_last_batch() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal_path = temp_dir.path().join(JOURNAL_FILE);

        let mut log = MoveLog::new();
        log.begin_batch(Path::new("/d"));
        log.append(moved("old.txt"));
        log.begin_batch(Path::new("/d"));
        log.record_created_dir(PathBuf::from("/d/Documents"));
        let id = log.append(moved("new.txt")).id;
        log.append(moved("newer.txt"));
        log.mark_reversed(id, Utc::now());
        log.save_journal(&journal_path).expect("Failed to save journal");

        let restored = MoveLog::load_journal(&journal_path)
            .expect("Failed to load journal")
            .expect("Journal should exist");

        assert_eq!(restored.last_batch(), log.last_batch());
        assert_eq!(restored.entries().len(), 2);
        assert_eq!(
            restored.last_batch_info().unwrap().created_dirs,
            vec![PathBuf::from("/d/Documents")]
        );

        // New entries continue the id sequence
        let mut restored = restored;
        restored.begin_batch(Path::new("/d"));
        assert!(restored.append(moved("later.txt")).id > id);
    }

    #[test]
    fn test_load_missing_journal() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = MoveLog::load_journal(&temp_dir.path().join(JOURNAL_FILE));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_load_corrupt_journal() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(JOURNAL_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MoveLog::load_journal(&path),
            Err(OrganizeError::Journal { .. })
        ));
    }

    #[test]
    fn test_failed_save_removes_stale_journal() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal_path = temp_dir.path().join(JOURNAL_FILE);

        let mut log = MoveLog::new();
        log.begin_batch(Path::new("/d"));
        log.append(moved("old.txt"));
        log.save_journal(&journal_path).expect("Failed to save journal");

        // A directory in the way of the temporary file makes the next save fail
        fs::create_dir(temp_dir.path().join(JOURNAL_TEMP_FILE)).unwrap();
        log.begin_batch(Path::new("/d"));
        log.append(moved("new.txt"));

        let result = log.save_journal(&journal_path);
        assert!(matches!(result, Err(OrganizeError::Journal { .. })));
        assert!(!journal_path.exists());
        assert!(matches!(MoveLog::load_journal(&journal_path), Ok(None)));
    }

    #[test]
    fn test_save_replaces_journal_without_leftovers() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal_path = temp_dir.path().join(JOURNAL_FILE);

        let mut log = MoveLog::new();
        log.begin_batch(Path::new("/d"));
        log.append(moved("a.txt"));
        log.save_journal(&journal_path).expect("Failed to save journal");
        log.begin_batch(Path::new("/d"));
        log.append(moved("b.txt"));
        log.save_journal(&journal_path).expect("Failed to save journal");

        let restored = MoveLog::load_journal(&journal_path).unwrap().unwrap();
        assert!(restored.last_batch()[0].source.ends_with("b.txt"));
        assert!(!temp_dir.path().join(JOURNAL_TEMP_FILE).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_journal_keeps_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal_path = temp_dir.path().join(JOURNAL_FILE);
        let name = OsStr::from_bytes(b"bad\xff.pdf");

        let mut log = MoveLog::new();
        log.begin_batch(Path::new("/d"));
        log.record_created_dir(Path::new("/d").join(name));
        log.append(MoveLogEntry::success(
            Path::new("/d").join(name),
            Path::new("/d/Documents").join(name),
            Category::Documents,
            1,
        ));
        log.save_journal(&journal_path).expect("Failed to save journal");

        let restored = MoveLog::load_journal(&journal_path).unwrap().unwrap();
        assert_eq!(restored.last_batch(), log.last_batch());
        assert_eq!(
            restored.last_batch_info().unwrap().created_dirs,
            vec![Path::new("/d").join(name)]
        );
    }
}
