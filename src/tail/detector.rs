//! Snapshot comparison and delta reads.
//!
//! The detector looks at the previous and current [`FileSnapshot`] of a path,
//! decides what happened to the file in between, and reads exactly the bytes
//! that decision requires: nothing when unchanged, the appended range when the
//! file grew, the whole file (or its tail window) when it was replaced.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

use super::error::TailError;
use super::snapshot::{FileIdentity, FileSnapshot};

/// Classification of the difference between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// No previous snapshot.
    Initial,
    /// File grew with the same identity.
    Appended,
    /// File shrank with the same identity.
    Truncated,
    /// A different file now lives at the path.
    Rotated,
    /// Same size, different mtime: contents must be compared.
    Touched,
    /// Nothing to read.
    Unchanged,
}

/// What a tick observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// New text. `initial` marks the first load, which carries the whole file.
    Appended {
        text: String,
        range: Range<u64>,
        initial: bool,
    },
    /// The file shrank in place; `content` is the re-read file.
    Truncated { content: String },
    /// The path now points at a different file.
    Rotated {
        content: String,
        identity: FileIdentity,
    },
    /// Same size but different text.
    Rewritten { content: String },
    Unchanged,
    /// The path does not exist.
    Missing { reason: String },
    /// The path exists but could not be read.
    Unreadable { reason: String },
}

impl ChangeEvent {
    /// Convert a failed tick into an event.
    #[must_use]
    pub fn from_error(err: &TailError) -> Self {
        if err.is_missing() {
            Self::Missing {
                reason: err.to_string(),
            }
        } else {
            Self::Unreadable {
                reason: err.to_string(),
            }
        }
    }

    /// Short lowercase name for logs and display.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Appended { initial: true, .. } => "loaded",
            Self::Appended { .. } => "appended",
            Self::Truncated { .. } => "truncated",
            Self::Rotated { .. } => "rotated",
            Self::Rewritten { .. } => "rewritten",
            Self::Unchanged => "unchanged",
            Self::Missing { .. } => "missing",
            Self::Unreadable { .. } => "unreadable",
        }
    }

    /// Whether the tick failed to read the file.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Missing { .. } | Self::Unreadable { .. })
    }

    /// Text that replaces everything captured so far, if any.
    #[must_use]
    pub fn replacement(&self) -> Option<&str> {
        match self {
            Self::Appended {
                text,
                initial: true,
                ..
            } => Some(text),
            Self::Truncated { content }
            | Self::Rotated { content, .. }
            | Self::Rewritten { content } => Some(content),
            _ => None,
        }
    }

    /// Text to add to what was captured so far, if any.
    #[must_use]
    pub fn appended(&self) -> Option<&str> {
        match self {
            Self::Appended {
                text,
                initial: false,
                ..
            } => Some(text),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Appended { range, .. } => {
                write!(f, "{} bytes {}..{}", self.name(), range.start, range.end)
            }
            Self::Rotated { identity, .. } => write!(f, "rotated to {identity}"),
            Self::Missing { reason } | Self::Unreadable { reason } => {
                write!(f, "{}: {reason}", self.name())
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Result of a detection: the event and the snapshot to keep for next time.
#[derive(Debug, Clone)]
pub struct Detection {
    pub event: ChangeEvent,
    pub snapshot: FileSnapshot,
}

/// Compares snapshots and reads deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector {
    /// Upper bound on bytes read by a full load; `None` reads everything.
    tail_window: Option<u64>,
}

impl ChangeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit full loads to the last `bytes` of the file.
    ///
    /// The window is aligned forward to the next line start. A window that lies
    /// inside a single unterminated line has no line start to align to and is
    /// read from its first byte.
    #[must_use]
    pub fn with_tail_window(bytes: u64) -> Self {
        Self {
            tail_window: Some(bytes),
        }
    }

    #[must_use]
    pub fn tail_window(&self) -> Option<u64> {
        self.tail_window
    }

    /// Classify the change between two snapshots without touching the file.
    ///
    /// Identity is checked before size: a rotated file can coincidentally have
    /// the same size as the one it replaced.
    #[must_use]
    pub fn classify(previous: Option<&FileSnapshot>, current: &FileSnapshot) -> ChangeKind {
        let Some(previous) = previous else {
            return ChangeKind::Initial;
        };

        if previous.identity() != current.identity() {
            return ChangeKind::Rotated;
        }
        if current.size() < previous.size() {
            return ChangeKind::Truncated;
        }
        if previous.same_stat(current) {
            return ChangeKind::Unchanged;
        }
        if current.size() > previous.size() {
            return ChangeKind::Appended;
        }
        ChangeKind::Touched
    }

    /// Classify the change and read whatever it requires.
    ///
    /// `captured` is the text the caller currently holds for this file; it is
    /// only consulted to decide whether a same-size rewrite changed anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn detect(
        &self,
        previous: Option<&FileSnapshot>,
        current: FileSnapshot,
        captured: &str,
    ) -> Result<Detection, TailError> {
        let kind = Self::classify(previous, &current);
        let path = current.path().to_path_buf();
        let read = |range: Range<u64>| {
            read_text(&path, range).map_err(|e| TailError::from_io(&path, e))
        };
        let load = |range: Range<u64>| {
            read_lines_from(&path, range).map_err(|e| TailError::from_io(&path, e))
        };

        let (event, offset) = match (kind, previous) {
            (ChangeKind::Unchanged, Some(previous)) => (ChangeEvent::Unchanged, previous.offset()),
            (ChangeKind::Appended, Some(previous)) => {
                let chunk = read(previous.offset()..current.size())?;
                if chunk.text.is_empty() {
                    (ChangeEvent::Unchanged, chunk.end)
                } else {
                    let end = chunk.end;
                    (
                        ChangeEvent::Appended {
                            range: previous.offset()..end,
                            text: chunk.text,
                            initial: false,
                        },
                        end,
                    )
                }
            }
            (ChangeKind::Touched, _) => {
                let chunk = load(self.full_range(current.size()))?;
                // A windowed capture keeps growing past the window with appends.
                let same = if self.tail_window.is_some() {
                    captured.ends_with(chunk.text.as_str())
                } else {
                    chunk.text == captured
                };
                if same {
                    (ChangeEvent::Unchanged, chunk.end)
                } else {
                    (ChangeEvent::Rewritten { content: chunk.text }, chunk.end)
                }
            }
            (ChangeKind::Truncated, _) => {
                let chunk = load(self.full_range(current.size()))?;
                (ChangeEvent::Truncated { content: chunk.text }, chunk.end)
            }
            (ChangeKind::Rotated, _) => {
                let chunk = load(self.full_range(current.size()))?;
                (
                    ChangeEvent::Rotated {
                        content: chunk.text,
                        identity: current.identity(),
                    },
                    chunk.end,
                )
            }
            _ => {
                let chunk = load(self.full_range(current.size()))?;
                (
                    ChangeEvent::Appended {
                        range: chunk.start..chunk.end,
                        text: chunk.text,
                        initial: true,
                    },
                    chunk.end,
                )
            }
        };

        tracing::trace!(
            path = %current.path().display(),
            kind = ?kind,
            offset,
            "Detected change"
        );

        Ok(Detection {
            event,
            snapshot: current.with_offset(offset),
        })
    }

    fn full_range(&self, size: u64) -> Range<u64> {
        let start = self.tail_window.map_or(0, |w| size.saturating_sub(w));
        start..size
    }
}

/// Decoded text read from a byte range of a file.
struct Chunk {
    text: String,
    start: u64,
    end: u64,
}

/// Read `range` from the file and decode it.
///
/// Trailing bytes of an incomplete UTF-8 sequence are left unconsumed so the
/// next read picks them up together with the rest of the character.
fn read_text(path: &Path, range: Range<u64>) -> io::Result<Chunk> {
    let bytes = read_bytes(path, range.clone())?;
    Ok(decode(&bytes, range.start))
}

/// Like [`read_text`], but a range starting past zero is moved forward to the
/// next line start when the range contains one.
///
/// The file may have shrunk since `range` was computed; offsets follow the
/// bytes actually read.
fn read_lines_from(path: &Path, range: Range<u64>) -> io::Result<Chunk> {
    if range.start == 0 {
        return read_text(path, range);
    }
    // Include the byte before the window: if it is a newline the window
    // already starts on a line.
    let bytes = read_bytes(path, range.start - 1..range.end)?;
    if bytes.is_empty() {
        return Ok(decode(&[], range.start));
    }
    let skip = bytes.iter().position(|&b| b == b'\n').map_or(1, |newline| newline + 1);
    let body = bytes.get(skip..).unwrap_or_default();
    Ok(decode(body, range.start - 1 + skip as u64))
}

fn read_bytes(path: &Path, range: Range<u64>) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(range.start))?;

    let len = range.end.saturating_sub(range.start);
    let mut bytes = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    file.take(len).read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn decode(body: &[u8], start: u64) -> Chunk {
    let complete = body.len() - incomplete_tail(body);
    Chunk {
        text: String::from_utf8_lossy(&body[..complete]).into_owned(),
        start,
        end: start + complete as u64,
    }
}

/// Number of trailing bytes that form an unfinished UTF-8 sequence.
fn incomplete_tail(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let expected = match byte {
            b if b & 0b1110_0000 == 0b1100_0000 => 2,
            b if b & 0b1111_0000 == 0b1110_0000 => 3,
            b if b & 0b1111_1000 == 0b1111_0000 => 4,
            _ => 1,
        };
        return if expected > back { back } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::time::{Duration, SystemTime};

    use tempfile::TempDir;

    fn snap(size: u64, mtime: u64, identity: u64, offset: u64) -> FileSnapshot {
        FileSnapshot::synthetic(
            size,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime)),
            FileIdentity::Inode { dev: 1, ino: identity },
            offset,
        )
    }

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_classify_initial() {
        let current = snap(10, 1, 1, 0);
        assert_eq!(ChangeDetector::classify(None, &current), ChangeKind::Initial);
    }

    #[test]
    fn test_classify_unchanged() {
        let previous = snap(10, 1, 1, 10);
        let current = snap(10, 1, 1, 0);
        assert_eq!(
            ChangeDetector::classify(Some(&previous), &current),
            ChangeKind::Unchanged
        );
    }

    #[test]
    fn test_classify_appended() {
        let previous = snap(10, 1, 1, 10);
        let current = snap(25, 2, 1, 0);
        assert_eq!(
            ChangeDetector::classify(Some(&previous), &current),
            ChangeKind::Appended
        );
    }

    #[test]
    fn test_classify_truncated_same_identity() {
        let previous = snap(100, 1, 1, 100);
        let current = snap(40, 2, 1, 0);
        assert_eq!(
            ChangeDetector::classify(Some(&previous), &current),
            ChangeKind::Truncated
        );
    }

    #[test]
    fn test_identity_beats_size() {
        // Same size, same mtime, new inode: still a rotation.
        let previous = snap(10, 1, 1, 10);
        let current = snap(10, 1, 2, 0);
        assert_eq!(
            ChangeDetector::classify(Some(&previous), &current),
            ChangeKind::Rotated
        );

        let grown = snap(50, 2, 2, 0);
        assert_eq!(
            ChangeDetector::classify(Some(&previous), &grown),
            ChangeKind::Rotated
        );
    }

    #[test]
    fn test_classify_touched() {
        let previous = snap(10, 1, 1, 10);
        let current = snap(10, 5, 1, 0);
        assert_eq!(
            ChangeDetector::classify(Some(&previous), &current),
            ChangeKind::Touched
        );
    }

    #[test]
    fn test_detect_initial_reads_everything() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "a\nb\n").unwrap();

        let current = FileSnapshot::capture(&path).unwrap();
        let detection = ChangeDetector::new().detect(None, current, "").unwrap();

        assert_eq!(
            detection.event,
            ChangeEvent::Appended {
                text: "a\nb\n".to_string(),
                range: 0..4,
                initial: true,
            }
        );
        assert_eq!(detection.snapshot.offset(), 4);
    }

    #[test]
    fn test_detect_appended_reads_only_delta() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "line1\n").unwrap();
        let detector = ChangeDetector::new();

        let first = detector
            .detect(None, FileSnapshot::capture(&path).unwrap(), "")
            .unwrap();
        append(&path, "line2\n");
        let second = detector
            .detect(
                Some(&first.snapshot),
                FileSnapshot::capture(&path).unwrap(),
                "line1\n",
            )
            .unwrap();

        assert_eq!(second.event.appended(), Some("line2\n"));
        assert_eq!(second.snapshot.offset(), 12);
    }

    #[test]
    fn test_detect_truncation_is_never_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "line1\nline2\n").unwrap();
        let detector = ChangeDetector::new();

        let first = detector
            .detect(None, FileSnapshot::capture(&path).unwrap(), "")
            .unwrap();
        // Shrink in place to a prefix of the old content.
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(6).unwrap();
        drop(file);

        let second = detector
            .detect(
                Some(&first.snapshot),
                FileSnapshot::capture(&path).unwrap(),
                "line1\nline2\n",
            )
            .unwrap();
        assert_eq!(
            second.event,
            ChangeEvent::Truncated {
                content: "line1\n".to_string()
            }
        );
        assert_eq!(second.snapshot.offset(), 6);
    }

    #[test]
    fn test_detect_unchanged_keeps_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "x\n").unwrap();
        let detector = ChangeDetector::new();

        let first = detector
            .detect(None, FileSnapshot::capture(&path).unwrap(), "")
            .unwrap();
        let second = detector
            .detect(
                Some(&first.snapshot),
                FileSnapshot::capture(&path).unwrap(),
                "x\n",
            )
            .unwrap();
        assert_eq!(second.event, ChangeEvent::Unchanged);
        assert_eq!(second.snapshot.offset(), 2);
    }

    #[test]
    fn test_detect_touched_without_change_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "x\n").unwrap();
        let real = FileSnapshot::capture(&path).unwrap();
        let previous =
            FileSnapshot::synthetic(2, Some(SystemTime::UNIX_EPOCH), real.identity(), 2);

        let detection = ChangeDetector::new()
            .detect(Some(&previous), real, "x\n")
            .unwrap();
        assert_eq!(detection.event, ChangeEvent::Unchanged);
    }

    #[test]
    fn test_detect_touched_with_new_text_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "y\n").unwrap();
        let real = FileSnapshot::capture(&path).unwrap();
        let previous =
            FileSnapshot::synthetic(2, Some(SystemTime::UNIX_EPOCH), real.identity(), 2);

        let detection = ChangeDetector::new()
            .detect(Some(&previous), real, "x\n")
            .unwrap();
        assert_eq!(
            detection.event,
            ChangeEvent::Rewritten {
                content: "y\n".to_string()
            }
        );
    }

    #[test]
    fn test_split_multibyte_character_is_held_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let snowman = "\u{2603}".as_bytes();
        let mut bytes = b"ok ".to_vec();
        bytes.extend_from_slice(&snowman[..1]);
        fs::write(&path, &bytes).unwrap();
        let detector = ChangeDetector::new();

        let first = detector
            .detect(None, FileSnapshot::capture(&path).unwrap(), "")
            .unwrap();
        assert_eq!(first.event.replacement(), Some("ok "));
        assert_eq!(first.snapshot.offset(), 3);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&snowman[1..]).unwrap();
        file.write_all(b"\n").unwrap();
        drop(file);

        let second = detector
            .detect(
                Some(&first.snapshot),
                FileSnapshot::capture(&path).unwrap(),
                "ok ",
            )
            .unwrap();
        assert_eq!(second.event.appended(), Some("\u{2603}\n"));
    }

    #[test]
    fn test_tail_window_starts_at_line_boundary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "first line\nsecond\nthird\n").unwrap();

        let detection = ChangeDetector::with_tail_window(10)
            .detect(None, FileSnapshot::capture(&path).unwrap(), "")
            .unwrap();
        assert_eq!(detection.event.replacement(), Some("third\n"));
        assert_eq!(detection.snapshot.offset(), 24);
    }

    #[test]
    fn test_tail_window_on_line_boundary_keeps_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "aaaa\nbbbb\n").unwrap();

        let detection = ChangeDetector::with_tail_window(5)
            .detect(None, FileSnapshot::capture(&path).unwrap(), "")
            .unwrap();
        assert_eq!(detection.event.replacement(), Some("bbbb\n"));
        assert_eq!(
            detection.event,
            ChangeEvent::Appended {
                text: "bbbb\n".to_string(),
                range: 5..10,
                initial: true,
            }
        );
    }

    #[test]
    fn test_tail_window_file_emptied_after_stat() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "first line\nsecond\nthree\n").unwrap();
        let stale = FileSnapshot::capture(&path).unwrap();
        assert_eq!(stale.size(), 24);

        // copytruncate between the stat and the read
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(0)
            .unwrap();

        let detection = ChangeDetector::with_tail_window(5)
            .detect(None, stale, "")
            .unwrap();
        assert_eq!(detection.event.replacement(), Some(""));
        assert_eq!(detection.snapshot.offset(), 19);
    }

    #[test]
    fn test_tail_window_file_shrunk_inside_window_after_stat() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "aaaa\nbbbb\ncccc\n").unwrap();
        let stale = FileSnapshot::capture(&path).unwrap();

        // Window starts at 5; only "bb" of it survives.
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(7)
            .unwrap();

        let detection = ChangeDetector::with_tail_window(10)
            .detect(None, stale, "")
            .unwrap();
        assert_eq!(detection.event.replacement(), Some("bb"));
        assert_eq!(detection.snapshot.offset(), 7);
    }

    #[test]
    fn test_tail_window_inside_single_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "abcdefghij").unwrap();

        let detection = ChangeDetector::with_tail_window(4)
            .detect(None, FileSnapshot::capture(&path).unwrap(), "")
            .unwrap();
        assert_eq!(
            detection.event,
            ChangeEvent::Appended {
                text: "ghij".to_string(),
                range: 6..10,
                initial: true,
            }
        );
    }

    #[test]
    fn test_tail_window_touch_after_append_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "aaaa\nbbbb\n").unwrap();
        let detector = ChangeDetector::with_tail_window(5);

        let first = detector
            .detect(None, FileSnapshot::capture(&path).unwrap(), "")
            .unwrap();
        let mut captured = first.event.replacement().unwrap().to_string();
        assert_eq!(captured, "bbbb\n");

        append(&path, "cccc\n");
        let second = detector
            .detect(
                Some(&first.snapshot),
                FileSnapshot::capture(&path).unwrap(),
                &captured,
            )
            .unwrap();
        captured.push_str(second.event.appended().unwrap());
        assert_eq!(captured, "bbbb\ncccc\n");

        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000))
            .unwrap();
        let touched = FileSnapshot::capture(&path).unwrap();
        assert_eq!(
            ChangeDetector::classify(Some(&second.snapshot), &touched),
            ChangeKind::Touched
        );

        let third = detector
            .detect(Some(&second.snapshot), touched, &captured)
            .unwrap();
        assert_eq!(third.event, ChangeEvent::Unchanged);
        assert_eq!(third.snapshot.offset(), 15);
    }

    #[test]
    fn test_tail_window_touch_with_new_tail_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "aaaa\nbbbb\n").unwrap();
        let real = FileSnapshot::capture(&path).unwrap();
        let previous =
            FileSnapshot::synthetic(10, Some(SystemTime::UNIX_EPOCH), real.identity(), 10);

        let detection = ChangeDetector::with_tail_window(5)
            .detect(Some(&previous), real, "xxxx\n")
            .unwrap();
        assert_eq!(
            detection.event,
            ChangeEvent::Rewritten {
                content: "bbbb\n".to_string()
            }
        );
    }

    #[test]
    fn test_incomplete_tail() {
        assert_eq!(incomplete_tail(b"abc"), 0);
        assert_eq!(incomplete_tail(&[b'a', 0xE2]), 1);
        assert_eq!(incomplete_tail(&[b'a', 0xE2, 0x98]), 2);
        assert_eq!(incomplete_tail(&[0xE2, 0x98, 0x83]), 0);
        assert_eq!(incomplete_tail(&[]), 0);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ChangeEvent::Unchanged.name(), "unchanged");
        let missing = ChangeEvent::from_error(&TailError::FileDeleted("/x".into()));
        assert!(missing.is_failure());
        assert_eq!(missing.name(), "missing");
        let denied = ChangeEvent::from_error(&TailError::PermissionDenied("/x".into()));
        assert_eq!(denied.name(), "unreadable");
    }
}
