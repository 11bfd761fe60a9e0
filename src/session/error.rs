//! Session error types.

use std::path::PathBuf;

use crate::bookmarks::BookmarkError;
use crate::matcher::MatcherError;
use crate::tail::TailError;

/// Errors that can occur during session operations.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// Operation needs a current file.
    #[error("No file selected")]
    NoFileSelected,

    /// File exists but its first read failed.
    #[error("Cannot read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// Tail error.
    #[error(transparent)]
    Tail(#[from] TailError),

    /// Bookmark error.
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),

    /// Invalid error pattern in configuration.
    #[error(transparent)]
    Pattern(#[from] MatcherError),
}
