//! Item filtering before download.
//!
//! Removes placeholder entries, items outside the configured publication
//! years, and items whose audio already exists in the library. The output
//! keeps the input order.

mod date;

pub use date::{DateFilter, MAX_EXPRESSION_LEN};

use crate::catalog::CandidateItem;
use crate::cleanup::{TMP_DIR, UNCONVERTED_DIR};
use crate::error::FilterError;
use chrono::Datelike;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Titles the API reports for entries that cannot be downloaded.
const PLACEHOLDER_TITLES: &[&str] = &["Private video", "Deleted video"];

/// Glyphs that yt-dlp and file systems substitute or reject in file names.
const HOSTILE_GLYPHS: &[char] = &['|', '｜', '/', '⧸', '*', '＊', '☆', '★', '•', '⁕'];

/// Normalize a title or file stem for already-downloaded comparison.
///
/// Filename-hostile glyphs become `?`, whitespace runs collapse to a single
/// space, and the result is trimmed.
pub fn normalize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if HOSTILE_GLYPHS.contains(&c) { '?' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result of filtering a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutput {
    /// URLs left to download, in catalog order.
    pub urls: Vec<String>,
    /// Items that passed the placeholder and date filters, downloaded or not.
    pub total_considered: usize,
}

impl FilterOutput {
    /// Items skipped because they are already on disk.
    pub fn already_downloaded(&self) -> usize {
        self.total_considered - self.urls.len()
    }
}

/// Filter applied to a catalog before the download batch.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    date_filter: Option<DateFilter>,
    skip_downloaded: bool,
    /// When set, on-disk names are collected recursively under this root
    /// instead of only the destination directory.
    library_root: Option<PathBuf>,
}

impl ItemFilter {
    pub fn new(date_filter: Option<DateFilter>, skip_downloaded: bool) -> Self {
        Self {
            date_filter,
            skip_downloaded,
            library_root: None,
        }
    }

    /// Scan the whole library for already-downloaded files.
    pub fn with_library_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.library_root = Some(root.into());
        self
    }

    /// Apply the filter. Creates `destination_dir` if it does not exist.
    #[instrument(skip(self, items), fields(items = items.len(), dir = %destination_dir.display()))]
    pub fn apply(
        &self,
        items: &[CandidateItem],
        destination_dir: &Path,
    ) -> Result<FilterOutput, FilterError> {
        std::fs::create_dir_all(destination_dir)?;

        let considered: Vec<&CandidateItem> = items
            .iter()
            .filter(|item| !PLACEHOLDER_TITLES.contains(&item.title.as_str()))
            .filter(|item| match &self.date_filter {
                Some(filter) => filter.matches(item.published_at.year()),
                None => true,
            })
            .collect();

        let total_considered = considered.len();

        let urls: Vec<String> = if self.skip_downloaded {
            let on_disk = match &self.library_root {
                Some(root) => downloaded_names_recursive(root),
                None => downloaded_names(destination_dir)?,
            };
            considered
                .into_iter()
                .filter(|item| {
                    let hit = on_disk.contains(&normalize_title(&item.title));
                    if hit {
                        debug!("Already downloaded: {}", item.title);
                    }
                    !hit
                })
                .map(|item| item.url.clone())
                .collect()
        } else {
            considered.into_iter().map(|item| item.url.clone()).collect()
        };

        info!(
            "{} of {} items left to download ({} filtered out)",
            urls.len(),
            items.len(),
            items.len() - urls.len()
        );

        Ok(FilterOutput {
            urls,
            total_considered,
        })
    }
}

/// Normalized stems of the regular files directly inside `dir`.
fn downloaded_names(dir: &Path) -> Result<HashSet<String>, FilterError> {
    let mut names = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Some(stem) = entry.path().file_stem() {
                names.insert(normalize_title(&stem.to_string_lossy()));
            }
        }
    }
    Ok(names)
}

/// Normalized stems of every regular file under `root`, outside working and
/// unconverted folders.
fn downloaded_names_recursive(root: &Path) -> HashSet<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0
                && e.file_type().is_dir()
                && matches!(e.file_name().to_str(), Some(TMP_DIR | UNCONVERTED_DIR)))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .file_stem()
                .map(|s| normalize_title(&s.to_string_lossy()))
        })
        .collect()
}
