//! Point-in-time file metadata.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Identity of the file behind a path.
///
/// Two snapshots with different identities refer to different files, even if
/// the path is the same. This is how rotation (rename + recreate) is told
/// apart from in-place truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileIdentity {
    /// Device and inode number.
    Inode { dev: u64, ino: u64 },
    /// Creation time, where the platform has no inode numbers.
    Created(SystemTime),
    /// The platform reports nothing usable; only size checks apply.
    Unknown,
}

impl FileIdentity {
    /// Extract the identity from file metadata.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self::Inode {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    /// Extract the identity from file metadata.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        metadata.created().map_or(Self::Unknown, Self::Created)
    }
}

impl std::fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inode { dev, ino } => write!(f, "{dev}:{ino}"),
            Self::Created(at) => write!(f, "created@{at:?}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One stat of a tracked file.
///
/// Snapshots are immutable: each tick captures a new one and the engine keeps
/// only the latest. `offset` is the number of bytes already consumed by the
/// reader when the snapshot was recorded; a freshly captured snapshot starts
/// with `offset == 0` and the engine sets it after reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    path: PathBuf,
    size: u64,
    modified: Option<SystemTime>,
    identity: FileIdentity,
    offset: u64,
}

impl FileSnapshot {
    /// Stat `path` and record its metadata.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the path cannot be stat'ed.
    pub fn capture(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::from_metadata(path, &metadata))
    }

    /// Build a snapshot from already-fetched metadata.
    #[must_use]
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
            identity: FileIdentity::from_metadata(metadata),
            offset: 0,
        }
    }

    /// Return a copy recording that `offset` bytes have been consumed.
    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    #[must_use]
    pub fn identity(&self) -> FileIdentity {
        self.identity
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether `other` describes the same file with identical size and mtime.
    #[must_use]
    pub fn same_stat(&self, other: &Self) -> bool {
        self.identity == other.identity
            && self.size == other.size
            && self.modified == other.modified
    }
}

#[cfg(test)]
impl FileSnapshot {
    /// Construct a snapshot by hand for classification tests.
    pub(crate) fn synthetic(
        size: u64,
        modified: Option<SystemTime>,
        identity: FileIdentity,
        offset: u64,
    ) -> Self {
        Self {
            path: PathBuf::from("/tmp/synthetic.log"),
            size,
            modified,
            identity,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_capture_records_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "hello\n").unwrap();

        let snapshot = FileSnapshot::capture(&path).unwrap();
        assert_eq!(snapshot.size(), 6);
        assert_eq!(snapshot.offset(), 0);
        assert_eq!(snapshot.path(), path.as_path());
        assert!(snapshot.modified().is_some());
    }

    #[test]
    fn test_capture_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = FileSnapshot::capture(&dir.path().join("nope.log")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_with_offset() {
        let snapshot = FileSnapshot::synthetic(10, None, FileIdentity::Unknown, 0);
        assert_eq!(snapshot.with_offset(7).offset(), 7);
    }

    #[cfg(unix)]
    #[test]
    fn test_identity_changes_on_recreate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "one\n").unwrap();
        let before = FileSnapshot::capture(&path).unwrap();

        // Keep the old inode alive so the new file cannot reuse it.
        let rotated = dir.path().join("app.log.1");
        fs::rename(&path, &rotated).unwrap();
        fs::write(&path, "two\n").unwrap();
        let after = FileSnapshot::capture(&path).unwrap();

        assert_ne!(before.identity(), after.identity());
        assert!(!before.same_stat(&after));
    }

    #[test]
    fn test_same_stat_ignores_offset() {
        let a = FileSnapshot::synthetic(10, None, FileIdentity::Unknown, 0);
        let b = a.clone().with_offset(10);
        assert!(a.same_stat(&b));
    }
}
