//! Move planning.
//!
//! The planner lists the immediate files of a directory, classifies them and
//! proposes a destination for each one without touching the filesystem.
//! The resulting [`Plan`] is what preview mode shows and what the executor
//! consumes.

use crate::activity_log::ACTIVITY_LOG_FILE;
use crate::config::{CompiledFilters, Config, LOCAL_CONFIG_FILE};
use crate::error::{ConfigError, OrganizeError, OrganizeResult};
use crate::file_category::{Category, FileMapper};
use crate::move_log::{JOURNAL_FILE, JOURNAL_TEMP_FILE, path_repr};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A file observed while planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// File name, lossily converted for display and classification.
    pub name: String,
    /// Lower-cased extension, if any.
    pub extension: Option<String>,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// A single proposed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlanEntry {
    #[serde(with = "path_repr")]
    pub source: PathBuf,
    #[serde(with = "path_repr")]
    pub destination: PathBuf,
    pub category: Category,
    pub size: u64,
}

/// An ordered set of proposed moves for one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(with = "path_repr")]
    root: PathBuf,
    entries: Vec<MovePlanEntry>,
}

impl Plan {
    /// Builds a plan from explicit entries, e.g. one edited in a preview.
    pub fn new(root: PathBuf, entries: Vec<MovePlanEntry>) -> Self {
        Self { root, entries }
    }

    /// The directory being organized.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[MovePlanEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovePlanEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keeps only the entries for which `keep` returns true (preview deselection).
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&MovePlanEntry) -> bool,
    {
        self.entries.retain(keep);
    }

    /// Number of planned moves per category.
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.category).or_insert(0) += 1;
        }
        counts
    }
}

/// Builds move plans.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    mapper: FileMapper,
    filters: CompiledFilters,
    sniff_content: bool,
    ignored_paths: Vec<PathBuf>,
}

impl Planner {
    pub fn new(mapper: FileMapper, filters: CompiledFilters) -> Self {
        Self {
            mapper,
            filters,
            sniff_content: false,
            ignored_paths: Vec::new(),
        }
    }

    /// Builds a planner from the `[filters]`, `[categories]` and `[organizer]` sections.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut planner = Self::new(config.file_mapper()?, config.compile_filters()?)
            .with_content_sniffing(config.organizer.sniff_content);
        if let Some(path) = &config.organizer.activity_log_path {
            planner.ignore_path(path.clone());
        }
        Ok(planner)
    }

    /// Enables content sniffing for files without an extension.
    pub fn with_content_sniffing(mut self, enabled: bool) -> Self {
        self.sniff_content = enabled;
        self
    }

    /// Never plan a move for this exact path (e.g. a custom activity log location).
    pub fn ignore_path(&mut self, path: PathBuf) {
        self.ignored_paths.push(path);
    }

    pub fn mapper(&self) -> &FileMapper {
        &self.mapper
    }

    /// Proposes a move for every eligible file directly inside `dir`.
    ///
    /// Planning only reads: it lists the directory, reads metadata and checks
    /// which destination names are already taken. Calling it twice without
    /// filesystem changes in between yields the same plan.
    ///
    /// # Errors
    ///
    /// * `DirectoryNotFound` - `dir` does not exist or is not a directory
    /// * `PermissionDenied` - `dir` cannot be listed
    pub fn plan(&self, dir: &Path) -> OrganizeResult<Plan> {
        let root = resolve_directory(dir)?;
        let files = self.scan(&root)?;

        let mut planned: HashSet<PathBuf> = HashSet::new();
        let mut entries = Vec::with_capacity(files.len());

        for file in files {
            let category = self.categorize(&file);
            let Some(file_name) = file.path.file_name() else {
                continue;
            };
            let candidate = root.join(category.dir_name()).join(file_name);
            let destination =
                disambiguate(&candidate, |path| planned.contains(path) || path_exists(path));

            if destination != candidate {
                debug!(
                    "{} renamed to {} to avoid a collision",
                    file.name,
                    destination.display()
                );
            }

            planned.insert(destination.clone());
            entries.push(MovePlanEntry {
                source: file.path,
                destination,
                category,
                size: file.size,
            });
        }

        info!("Planned {} moves in {}", entries.len(), root.display());
        Ok(Plan { root, entries })
    }

    /// Lists the eligible files directly inside `dir`, ordered by name.
    ///
    /// Directories (category folders included), symlinks and other special
    /// files are skipped, as are tidybox's own files and anything the
    /// configured filters reject.
    pub fn scan(&self, dir: &Path) -> OrganizeResult<Vec<FileEntry>> {
        let read_dir = fs::read_dir(dir).map_err(|e| listing_error(dir, e))?;

        let mut files = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Could not read an entry of {}: {}", dir.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("Could not analyze '{}': {}", name, e);
                    continue;
                }
            };

            if file_type.is_dir() {
                if Category::from_dir_name(&name).is_some() {
                    debug!("Skipping category folder '{}'", name);
                } else {
                    debug!("Skipping '{}' (is a directory)", name);
                }
                continue;
            }
            if !file_type.is_file() {
                debug!("Skipping '{}' (not a regular file)", name);
                continue;
            }
            if self.is_own_file(&name, &path) {
                continue;
            }
            if !self.filters.should_include(&name) {
                debug!("Skipping '{}' (excluded by filters)", name);
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Could not analyze '{}': {}", name, e);
                    continue;
                }
            };

            files.push(FileEntry {
                extension: path
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_lowercase())
                    .filter(|ext| !ext.is_empty()),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                path,
                name,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Picks the category of a scanned file.
    pub fn categorize(&self, file: &FileEntry) -> Category {
        let category = self.mapper.classify(&file.name);
        if category != Category::Others || !self.sniff_content || file.extension.is_some() {
            return category;
        }

        match infer::get_from_path(&file.path) {
            Ok(Some(kind)) => self
                .mapper
                .mime_to_category(kind.mime_type())
                .unwrap_or(Category::Others),
            Ok(None) => Category::Others,
            Err(e) => {
                warn!("Could not sniff '{}': {}", file.name, e);
                Category::Others
            }
        }
    }

    fn is_own_file(&self, name: &str, path: &Path) -> bool {
        name == JOURNAL_FILE
            || name == JOURNAL_TEMP_FILE
            || name == ACTIVITY_LOG_FILE
            || name == LOCAL_CONFIG_FILE
            || self.ignored_paths.iter().any(|ignored| ignored == path)
    }
}

/// Checks that `dir` is an existing directory and returns its absolute path.
pub fn resolve_directory(dir: &Path) -> OrganizeResult<PathBuf> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => {
            fs::canonicalize(dir).map_err(|e| listing_error(dir, e))
        }
        Ok(_) => Err(OrganizeError::DirectoryNotFound {
            path: dir.to_path_buf(),
        }),
        Err(e) => Err(listing_error(dir, e)),
    }
}

fn listing_error(dir: &Path, err: io::Error) -> OrganizeError {
    let path = dir.to_path_buf();
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
            OrganizeError::DirectoryNotFound { path }
        }
        io::ErrorKind::PermissionDenied => OrganizeError::PermissionDenied { path },
        _ => OrganizeError::Io { path, source: err },
    }
}

/// True if anything (including a dangling symlink) occupies `path`.
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Returns `candidate` if it is free, otherwise `name (n).ext` with the
/// smallest `n >= 1` for which `is_taken` returns false.
///
/// # Examples
///
/// ```
/// use tidybox::planner::disambiguate;
/// use std::path::{Path, PathBuf};
///
/// let taken = [PathBuf::from("/d/report.pdf"), PathBuf::from("/d/report (1).pdf")];
/// let path = disambiguate(Path::new("/d/report.pdf"), |p| taken.iter().any(|t| t == p));
/// assert_eq!(path, PathBuf::from("/d/report (2).pdf"));
/// ```
pub fn disambiguate<F>(candidate: &Path, mut is_taken: F) -> PathBuf
where
    F: FnMut(&Path) -> bool,
{
    if !is_taken(candidate) {
        return candidate.to_path_buf();
    }

    let parent = candidate.parent().unwrap_or_else(|| Path::new(""));
    let stem = candidate.file_stem().unwrap_or_default();
    let extension = candidate.extension();

    let mut n: u64 = 1;
    loop {
        let path = parent.join(numbered_name(stem, extension, n));
        if !is_taken(&path) {
            return path;
        }
        n += 1;
    }
}

fn numbered_name(stem: &OsStr, extension: Option<&OsStr>, n: u64) -> OsString {
    let mut name = stem.to_os_string();
    name.push(format!(" ({})", n));
    if let Some(extension) = extension {
        name.push(".");
        name.push(extension);
    }
    name
}
