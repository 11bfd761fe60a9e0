//! Tail error types.

use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur while tailing a file.
#[derive(thiserror::Error, Debug)]
pub enum TailError {
    /// Tailed file does not exist.
    #[error("Tailed file deleted: {0}")]
    FileDeleted(PathBuf),

    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Filesystem watcher could not be set up.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Poll thread could not be spawned.
    #[error("Failed to spawn poll thread: {0}")]
    Spawn(io::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TailError {
    /// Classify an I/O error raised while accessing `path`.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileDeleted(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Whether the error means the file is absent rather than unreadable.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::FileDeleted(_))
    }
}
