//! Error types shared by the planner, executor, undo controller and session.
//!
//! Planner-level errors abort an operation before anything is touched.
//! Executor and undo errors are per-entry: they are converted into a
//! [`FailureKind`] and recorded instead of being returned.

use crate::move_log::FailureKind;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while organizing a directory or undoing a batch.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The directory to organize does not exist or is not a directory.
    #[error("Directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    /// A directory could not be listed or a file could not be touched.
    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// The target volume ran out of space.
    #[error("Disk full while writing {}", path.display())]
    DiskFull { path: PathBuf },

    /// The original location of a file is occupied by another file.
    #[error("Conflict: {} is occupied by a different file", path.display())]
    Conflict { path: PathBuf },

    /// The file vanished between planning and execution.
    #[error("Source missing: {}", path.display())]
    SourceMissing { path: PathBuf },

    /// No organize operation has been executed yet.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// A cross-volume copy could not be completed and was rolled back.
    #[error("Cross-volume move of {} failed: {reason}", path.display())]
    CrossVolumeCopy { path: PathBuf, reason: String },

    /// Any other I/O failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another organize or undo operation is already in flight.
    #[error("Another operation is already running")]
    Busy,

    /// The undo journal could not be read or written.
    #[error("Journal error ({}): {reason}", path.display())]
    Journal { path: PathBuf, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl OrganizeError {
    /// Classifies an I/O error raised while operating on `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Self::SourceMissing { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::StorageFull => Self::DiskFull { path },
            _ => Self::Io { path, source: err },
        }
    }

    /// The failure kind recorded in the move log for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::SourceMissing { .. } => FailureKind::SourceMissing,
            Self::PermissionDenied { .. } => FailureKind::PermissionDenied,
            Self::DiskFull { .. } => FailureKind::DiskFull,
            Self::CrossVolumeCopy { .. } => FailureKind::CrossVolumeCopy,
            Self::Conflict { .. } => FailureKind::Conflict,
            _ => FailureKind::Other,
        }
    }
}

/// Result type for organize, undo and session operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Errors that can occur during configuration loading and filter compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },

    /// A `[categories]` key does not name a known category.
    #[error("Unknown category '{0}' (expected one of Documents, Images, Videos, Audio, Archives, Others)")]
    UnknownCategory(String),

    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}
