//! Local resource grouping.
//!
//! Files are grouped by a key derived from their name:
//! - the stem (name without the last extension) is split at the first
//!   separator and the part before it is the key, so `A_1.png` and
//!   `A_2.png` both belong to `A`
//! - a stem without a separator is its own key
//!
//! Paths within a group are ordered by comparing file names
//! lexicographically. This is reproducible but not numeric: `A_10` sorts
//! before `A_2`.
//!
//! This module never touches the filesystem. The directory walk lives in
//! sync-client, which feeds the paths it finds into [`ResourceIndex::from_paths`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File extensions accepted for image transfers.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// File extensions accepted for text transfers.
pub const TEXT_EXTENSIONS: &[&str] = &["txt"];

/// Default separator between a key and its part suffix.
pub const DEFAULT_SEPARATOR: char = '_';

/// Which files are indexed and how their keys are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRules {
    /// Accepted extensions, lowercase, without the leading dot.
    extensions: Vec<String>,
    /// Key/part separator. `None` keys every file by its full stem.
    separator: Option<char>,
}

impl IndexRules {
    /// Create rules from an extension allow-list.
    ///
    /// Extensions are matched case-insensitively; a leading dot is optional.
    pub fn new<S: AsRef<str>>(extensions: impl IntoIterator<Item = S>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            separator: Some(DEFAULT_SEPARATOR),
        }
    }

    /// Rules for picture transfers.
    pub fn images() -> Self {
        Self::new(IMAGE_EXTENSIONS)
    }

    /// Rules for text transfers.
    pub fn text() -> Self {
        Self::new(TEXT_EXTENSIONS)
    }

    /// Set the key separator (`None` disables multi-part grouping).
    pub fn with_separator(mut self, separator: Option<char>) -> Self {
        self.separator = separator;
        self
    }

    /// The accepted extensions.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// The key separator.
    pub fn separator(&self) -> Option<char> {
        self.separator
    }

    /// Whether a file name passes the extension allow-list.
    pub fn accepts(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.len() > ext.len() && lower.ends_with(&format!(".{}", ext)))
    }

    /// Grouping key for a file name, or `None` if the file is not accepted
    /// or the derived key is empty.
    pub fn key_for(&self, file_name: &str) -> Option<String> {
        if !self.accepts(file_name) {
            return None;
        }
        let stem = Path::new(file_name).file_stem()?.to_str()?;
        let key = derive_key(stem, self.separator);
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }
}

/// Derive the grouping key from a file stem.
pub fn derive_key(stem: &str, separator: Option<char>) -> &str {
    match separator {
        Some(sep) => stem.split(sep).next().unwrap_or(stem),
        None => stem,
    }
}

/// Key → ordered file paths, built once per run and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIndex {
    groups: BTreeMap<String, Vec<PathBuf>>,
}

impl ResourceIndex {
    /// Build an index from candidate paths.
    ///
    /// Paths rejected by `rules` (wrong extension, non-UTF-8 name, empty key)
    /// are left out.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>, rules: &IndexRules) -> Self {
        let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(key) = rules.key_for(name) {
                groups.entry(key).or_default().push(path);
            }
        }

        for paths in groups.values_mut() {
            paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        }

        Self { groups }
    }

    /// Paths for a key, if the key has a group.
    pub fn get(&self, key: &str) -> Option<&[PathBuf]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Whether a key has a group.
    pub fn contains(&self, key: &str) -> bool {
        self.groups.contains_key(key)
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the index has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of indexed files.
    pub fn file_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}
