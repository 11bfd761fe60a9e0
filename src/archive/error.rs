//! Archive error types.

use std::path::PathBuf;

/// Errors that can occur while writing or reading zip archives.
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    /// File to archive does not exist.
    #[error("Source file does not exist: {0}")]
    SourceMissing(PathBuf),

    /// Requested entry is not in the archive.
    #[error("No entry {entry:?} in {archive}")]
    EntryNotFound { archive: PathBuf, entry: String },

    /// Entry name would escape the extraction directory.
    #[error("Refusing to extract unsafe entry name: {0}")]
    UnsafeEntry(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip format error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_not_found_display() {
        let err = ArchiveError::EntryNotFound {
            archive: PathBuf::from("/tmp/logs.zip"),
            entry: "app.log".to_string(),
        };
        assert_eq!(err.to_string(), "No entry \"app.log\" in /tmp/logs.zip");
    }
}
