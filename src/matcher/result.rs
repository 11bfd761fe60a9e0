//! Match result type.

use serde::{Deserialize, Serialize};

/// Outcome of scanning content for matching lines.
///
/// `NotSearched` and `NoMatches` are deliberately different: the first means
/// no scan was asked for, the second that a scan ran and found nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "lines", rename_all = "snake_case")]
pub enum MatchResult {
    #[default]
    NotSearched,
    NoMatches,
    /// Matching lines in file order, whitespace-trimmed.
    Lines(Vec<String>),
}

impl MatchResult {
    /// Wrap scanned lines, mapping an empty scan to `NoMatches`.
    #[must_use]
    pub fn from_lines(lines: Vec<String>) -> Self {
        if lines.is_empty() {
            Self::NoMatches
        } else {
            Self::Lines(lines)
        }
    }

    /// Matched lines; empty unless `Lines`.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        match self {
            Self::Lines(lines) => lines,
            _ => &[],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }

    /// Whether a scan has run.
    #[must_use]
    pub fn is_searched(&self) -> bool {
        !matches!(self, Self::NotSearched)
    }
}
