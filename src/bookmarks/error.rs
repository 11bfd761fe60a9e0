//! Bookmark error types.

use std::path::PathBuf;

/// Errors that can occur during bookmark operations.
#[derive(thiserror::Error, Debug)]
pub enum BookmarkError {
    /// Path is already bookmarked.
    #[error("Already bookmarked: {0}")]
    AlreadyExists(PathBuf),

    /// Bookmarked file no longer exists; the bookmark has been removed.
    #[error("Bookmarked file no longer exists: {0}")]
    NotFound(PathBuf),

    /// Path is not in the bookmark list.
    #[error("Not bookmarked: {0}")]
    NotBookmarked(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_display() {
        let err = BookmarkError::AlreadyExists(PathBuf::from("/var/log/syslog"));
        assert_eq!(err.to_string(), "Already bookmarked: /var/log/syslog");
    }

    #[test]
    fn test_not_found_display() {
        let err = BookmarkError::NotFound(PathBuf::from("/var/log/old.log"));
        assert_eq!(
            err.to_string(),
            "Bookmarked file no longer exists: /var/log/old.log"
        );
    }
}
