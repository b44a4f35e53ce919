//! File categorization by extension.
//!
//! This module maps file names to one of a fixed set of categories. The
//! mapping is a total function: anything not in the extension table lands
//! in [`Category::Others`].
//!
//! # Examples
//!
//! ```
//! use tidybox::file_category::{Category, FileMapper};
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.classify("holiday.JPG"), Category::Images);
//! assert_eq!(mapper.classify("song.mp3"), Category::Audio);
//! assert_eq!(mapper.classify("README"), Category::Others);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Destination category for a file.
///
/// The set is closed; each variant names the folder files are moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Text, office and PDF files
    Documents,
    /// Raster and vector images
    Images,
    /// Video files
    Videos,
    /// Audio files
    Audio,
    /// Compressed archives
    Archives,
    /// Anything not matched by the extension table
    Others,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 6] = [
        Category::Documents,
        Category::Images,
        Category::Videos,
        Category::Audio,
        Category::Archives,
        Category::Others,
    ];

    /// Returns the folder name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use tidybox::file_category::Category;
    ///
    /// assert_eq!(Category::Images.dir_name(), "Images");
    /// assert_eq!(Category::Others.dir_name(), "Others");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Documents => "Documents",
            Category::Images => "Images",
            Category::Videos => "Videos",
            Category::Audio => "Audio",
            Category::Archives => "Archives",
            Category::Others => "Others",
        }
    }

    /// Looks up a category by its exact folder name.
    pub fn from_dir_name(name: &str) -> Option<Category> {
        Self::ALL.into_iter().find(|c| c.dir_name() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Maps file extensions (and, for content sniffing, MIME types) to categories.
#[derive(Debug, Clone)]
pub struct FileMapper {
    extension_map: HashMap<String, Category>,
}

impl FileMapper {
    /// Creates a new `FileMapper` with the standard extension table.
    pub fn new() -> Self {
        let mut mapper = Self {
            extension_map: HashMap::new(),
        };
        mapper.populate_standard_mappings();
        mapper
    }

    /// Creates a mapper from the standard table plus user overrides.
    ///
    /// Overrides replace the built-in mapping for an extension, so moving
    /// `csv` from Documents to Archives is a single entry.
    pub fn with_overrides(overrides: &HashMap<Category, Vec<String>>) -> Self {
        let mut mapper = Self::new();
        // Apply in category order so the result doesn't depend on map iteration
        for category in Category::ALL {
            if let Some(exts) = overrides.get(&category) {
                for ext in exts {
                    mapper.add_extension_mapping(ext, category);
                }
            }
        }
        mapper
    }

    fn populate_standard_mappings(&mut self) {
        const TABLE: &[(Category, &[&str])] = &[
            (
                Category::Images,
                &["jpg", "jpeg", "png", "gif", "bmp", "svg", "tiff", "tif", "webp", "ico", "heic"],
            ),
            (
                Category::Documents,
                &[
                    "pdf", "docx", "doc", "txt", "pptx", "ppt", "xlsx", "xls", "odt", "rtf", "md",
                    "csv",
                ],
            ),
            (
                Category::Videos,
                &["mp4", "mov", "avi", "mkv", "flv", "wmv", "webm", "m4v", "3gp"],
            ),
            (Category::Audio, &["mp3", "wav", "aac", "flac", "ogg", "m4a", "wma"]),
            (Category::Archives, &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"]),
        ];

        for (category, exts) in TABLE {
            for ext in *exts {
                self.add_extension_mapping(ext, *category);
            }
        }
    }

    /// Adds a file extension to category mapping. A leading dot is ignored.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.extension_map.insert(ext, category);
    }

    /// Maps a file extension to a category.
    ///
    /// # Examples
    ///
    /// ```
    /// use tidybox::file_category::{Category, FileMapper};
    ///
    /// let mapper = FileMapper::default();
    /// assert_eq!(mapper.extension_to_category("pdf"), Some(Category::Documents));
    /// assert_eq!(mapper.extension_to_category("PNG"), Some(Category::Images));
    /// assert_eq!(mapper.extension_to_category("xyz"), None);
    /// ```
    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        self.extension_map.get(&ext.to_lowercase()).copied()
    }

    /// Classifies a file by name.
    ///
    /// Only the last extension counts (`backup.tar.gz` is an archive because
    /// of `gz`). Names without an extension, including dotfiles such as
    /// `.bashrc`, are [`Category::Others`].
    pub fn classify(&self, file_name: &str) -> Category {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.extension_to_category(ext))
            .unwrap_or(Category::Others)
    }

    /// Maps a sniffed MIME type to a category.
    ///
    /// Used only when content sniffing is enabled for extensionless files.
    pub fn mime_to_category(&self, mime_type: &str) -> Option<Category> {
        let mime = mime_type.to_lowercase();
        let (top, sub) = mime.split_once('/')?;
        match top {
            "image" => Some(Category::Images),
            "video" => Some(Category::Videos),
            "audio" => Some(Category::Audio),
            "text" => Some(Category::Documents),
            "application" => match sub {
                "pdf" | "msword" | "rtf" | "vnd.oasis.opendocument.text" => {
                    Some(Category::Documents)
                }
                s if s.starts_with("vnd.openxmlformats-officedocument") => {
                    Some(Category::Documents)
                }
                "zip" | "gzip" | "x-tar" | "x-7z-compressed" | "vnd.rar" | "x-rar-compressed"
                | "x-bzip2" | "x-xz" => Some(Category::Archives),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}
