//! Persistent bookmark list.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::BookmarkError;

/// File name of the bookmark document inside the data directory.
pub const BOOKMARKS_FILE: &str = "bookmarks.json";

/// Ordered, duplicate-free list of bookmarked paths.
///
/// Every mutation is written through to disk before it returns. The document
/// is a plain JSON array of path strings.
#[derive(Debug, Clone)]
pub struct BookmarkStore {
    file: PathBuf,
    entries: Vec<PathBuf>,
}

impl BookmarkStore {
    /// Open the store backed by `file`, loading it if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(file: impl Into<PathBuf>) -> Result<Self, BookmarkError> {
        let mut store = Self {
            file: file.into(),
            entries: Vec::new(),
        };
        store.load()?;
        Ok(store)
    }

    /// Default location of the bookmark document in `data_dir`.
    #[must_use]
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(BOOKMARKS_FILE)
    }

    /// Re-read the document from disk.
    ///
    /// A missing document is an empty list. Duplicate entries in a hand-edited
    /// document are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&mut self) -> Result<&[PathBuf], BookmarkError> {
        self.entries.clear();
        if !self.file.exists() {
            return Ok(&self.entries);
        }

        let content = fs::read_to_string(&self.file)?;
        let loaded: Vec<PathBuf> = serde_json::from_str(&content)?;
        for path in loaded {
            if !self.entries.contains(&path) {
                self.entries.push(path);
            }
        }
        tracing::debug!(
            file = %self.file.display(),
            count = self.entries.len(),
            "Loaded bookmarks"
        );
        Ok(&self.entries)
    }

    /// Bookmarked paths in insertion order.
    #[must_use]
    pub fn list(&self) -> &[PathBuf] {
        &self.entries
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|p| p == path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the backing document.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Add a bookmark.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkError::AlreadyExists` if the path is already present
    /// (the store is left unchanged), or an I/O error if the document cannot be
    /// written.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> Result<(), BookmarkError> {
        let path = path.into();
        if self.contains(&path) {
            return Err(BookmarkError::AlreadyExists(path));
        }

        self.entries.push(path.clone());
        if let Err(e) = self.save() {
            self.entries.pop();
            return Err(e);
        }
        tracing::info!(path = %path.display(), "Bookmark added");
        Ok(())
    }

    /// Remove a bookmark. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn remove(&mut self, path: &Path) -> Result<bool, BookmarkError> {
        let Some(index) = self.entries.iter().position(|p| p == path) else {
            return Ok(false);
        };

        let removed = self.entries.remove(index);
        if let Err(e) = self.save() {
            self.entries.insert(index, removed);
            return Err(e);
        }
        tracing::info!(path = %path.display(), "Bookmark removed");
        Ok(true)
    }

    /// Resolve a bookmark for opening, dropping it if its file is gone.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkError::NotBookmarked` if the path is not in the list,
    /// `BookmarkError::NotFound` if the file no longer exists (the bookmark has
    /// been removed and the store persisted), or an I/O error from persisting.
    pub fn access(&mut self, path: &Path) -> Result<PathBuf, BookmarkError> {
        if !self.contains(path) {
            return Err(BookmarkError::NotBookmarked(path.to_path_buf()));
        }
        if path.exists() {
            return Ok(path.to_path_buf());
        }

        tracing::warn!(path = %path.display(), "Bookmarked file no longer exists, removing");
        self.remove(path)?;
        Err(BookmarkError::NotFound(path.to_path_buf()))
    }

    /// Write the full list atomically.
    fn save(&self) -> Result<(), BookmarkError> {
        if let Some(parent) = self.file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.file.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.file)?;
        Ok(())
    }
}
