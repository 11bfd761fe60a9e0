//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bookmarks::BookmarkStore;
use crate::matcher::{LinePredicate, MatcherError, DEFAULT_ERROR_PATTERN, DEFAULT_MATCH_WINDOW};
use crate::tail::ChangeDetector;

use super::settings::Settings;

/// Name of the per-user data directory.
pub const APP_DIR_NAME: &str = "logkeeper";

/// Runtime configuration for monitor sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Poll interval while following, in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of recent search matches to keep.
    pub match_window: usize,
    /// Case-insensitive patterns that mark a line as an error.
    pub error_patterns: Vec<String>,
    /// Wake the poll loop on filesystem events as well as on the timer.
    pub wake_on_change: bool,
    /// Read at most this many trailing bytes when (re)loading a whole file.
    pub tail_window_bytes: Option<u64>,
    /// Where bookmarks and settings are stored.
    pub data_dir: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            match_window: DEFAULT_MATCH_WINDOW,
            error_patterns: vec![DEFAULT_ERROR_PATTERN.to_string()],
            wake_on_change: true,
            tail_window_bytes: None,
            data_dir: None,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Resolved data directory: configured, else the platform data dir,
    /// else the working directory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir().map_or_else(|| PathBuf::from("."), |d| d.join(APP_DIR_NAME))
        })
    }

    #[must_use]
    pub fn bookmarks_path(&self) -> PathBuf {
        BookmarkStore::default_path(&self.data_dir())
    }

    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        Settings::default_path(&self.data_dir())
    }

    /// Change detector honouring `tail_window_bytes`.
    #[must_use]
    pub fn detector(&self) -> ChangeDetector {
        self.tail_window_bytes
            .map_or_else(ChangeDetector::new, ChangeDetector::with_tail_window)
    }

    /// Compile `error_patterns`.
    ///
    /// The single default keyword uses a plain case-insensitive substring
    /// check rather than a regex.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid regex.
    pub fn error_predicate(&self) -> Result<LinePredicate, MatcherError> {
        if self.error_patterns.len() == 1 && self.error_patterns[0] == DEFAULT_ERROR_PATTERN {
            return Ok(LinePredicate::error_keyword());
        }
        LinePredicate::patterns(&self.error_patterns)
    }
}
