//! tidybox - sort the files of a directory into category folders
//!
//! This library classifies files by extension, plans moves into category
//! folders, executes them with per-file error handling, keeps a log that
//! allows the last batch to be undone, and reports per-category statistics.
//! A [`Session`] ties these together for front ends.

pub mod activity_log;
pub mod analytics;
pub mod cli;
pub mod config;
pub mod error;
pub mod file_category;
pub mod file_organizer;
pub mod move_log;
pub mod output;
pub mod planner;
pub mod session;
pub mod undo;

pub use analytics::{CategoryStats, Summary, format_size};
pub use config::{CompiledFilters, Config};
pub use error::{ConfigError, OrganizeError, OrganizeResult};
pub use file_category::{Category, FileMapper};
pub use file_organizer::{BatchReport, FileOrganizer};
pub use move_log::{MoveLog, MoveLogEntry};
pub use planner::{MovePlanEntry, Plan, Planner};
pub use session::{Session, SharedSession, StopFlag};
pub use undo::{UndoManager, UndoReport};

pub use cli::{OrganizeCommand, run_cli, run_cli_with_config, run_shell};

/// Initialise the tracing subscriber for structured logging.
///
/// Logs go to stderr. `RUST_LOG` takes precedence; otherwise the level is
/// `debug` when `verbose` is set and `warn` when it is not. Calling this
/// more than once is harmless.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
