//! Per-category statistics.
//!
//! Summaries are computed fresh from either the move log, a plan, or a scan
//! of a directory. Nothing is cached; call again after the filesystem or the
//! log changes.

use crate::error::{OrganizeError, OrganizeResult};
use crate::file_category::Category;
use crate::move_log::MoveLog;
use crate::planner::{Plan, Planner, resolve_directory};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use tracing::{debug, warn};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Upper bounds (exclusive) and labels of the size histogram.
const BUCKETS: [(u64, &str); 5] = [
    (KB, "< 1 KB"),
    (MB, "1 KB - 1 MB"),
    (100 * MB, "1 MB - 100 MB"),
    (GB, "100 MB - 1 GB"),
    (u64::MAX, ">= 1 GB"),
];

/// Size and count totals for a single category.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub count: u64,
    pub total_size: u64,
}

/// One bar of the size histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeBucket {
    pub label: &'static str,
    pub count: u64,
}

/// Category totals plus a size histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Every category is present, zeroed when nothing falls into it.
    pub by_category: BTreeMap<Category, CategoryStats>,
    pub size_distribution: Vec<SizeBucket>,
}

impl Summary {
    pub fn new() -> Self {
        Self {
            by_category: Category::ALL
                .into_iter()
                .map(|c| (c, CategoryStats::default()))
                .collect(),
            size_distribution: BUCKETS
                .iter()
                .map(|&(_, label)| SizeBucket { label, count: 0 })
                .collect(),
        }
    }

    /// Counts one file.
    pub fn add(&mut self, category: Category, size: u64) {
        let stats = self.by_category.entry(category).or_default();
        stats.count += 1;
        stats.total_size += size;

        let index = BUCKETS
            .iter()
            .position(|(limit, _)| size < *limit)
            .unwrap_or(BUCKETS.len() - 1);
        self.size_distribution[index].count += 1;
    }

    pub fn get(&self, category: Category) -> CategoryStats {
        self.by_category.get(&category).copied().unwrap_or_default()
    }

    pub fn total_files(&self) -> u64 {
        self.by_category.values().map(|s| s.count).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.by_category.values().map(|s| s.total_size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_files() == 0
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::new()
    }
}

/// Summarizes the moves in `log` that succeeded and have not been undone.
pub fn summarize_log(log: &MoveLog) -> Summary {
    let mut summary = Summary::new();
    for entry in log.entries().iter().filter(|e| e.is_undoable()) {
        summary.add(entry.category, entry.size);
    }
    summary
}

/// Summarizes what executing `plan` would move.
pub fn summarize_plan(plan: &Plan) -> Summary {
    let mut summary = Summary::new();
    for entry in plan.iter() {
        summary.add(entry.category, entry.size);
    }
    summary
}

/// Summarizes the current contents of `dir`.
///
/// Loose files are classified the way the planner would classify them.
/// Files inside a category folder count under that folder's category,
/// whatever their extension.
pub fn summarize_directory(dir: &std::path::Path, planner: &Planner) -> OrganizeResult<Summary> {
    let root = resolve_directory(dir)?;
    let mut summary = Summary::new();

    for file in planner.scan(&root)? {
        summary.add(planner.categorize(&file), file.size);
    }

    for category in Category::ALL {
        let folder = root.join(category.dir_name());
        if !folder.is_dir() {
            continue;
        }

        let entries = fs::read_dir(&folder).map_err(|e| OrganizeError::from_io(&folder, e))?;
        for entry in entries.flatten() {
            match entry.metadata() {
                Ok(metadata) if metadata.is_file() => summary.add(category, metadata.len()),
                Ok(_) => {}
                Err(e) => warn!("Could not analyze '{}': {}", entry.path().display(), e),
            }
        }
    }

    debug!(
        "Summarized {}: {} files, {}",
        root.display(),
        summary.total_files(),
        format_size(summary.total_size())
    );
    Ok(summary)
}

/// Format a byte count into a human-readable string with appropriate unit.
///
/// Uses binary units (KiB = 1024) labelled KB, MB, GB, TB.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else if b < TB {
        format!("{:.2} GB", b / GB)
    } else {
        format!("{:.2} TB", b / TB)
    }
}
