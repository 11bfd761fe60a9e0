//! Line predicates.

use regex::{Regex, RegexBuilder};

/// Keyword used for error analysis when nothing else is configured.
pub const DEFAULT_ERROR_PATTERN: &str = "error";

/// Error type for predicate construction.
#[derive(thiserror::Error, Debug)]
pub enum MatcherError {
    /// Invalid regex pattern.
    #[error("Invalid error pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Decides whether a single line matches.
#[derive(Debug, Clone)]
pub enum LinePredicate {
    /// Case-sensitive substring, exactly as typed.
    Substring(String),
    /// Case-insensitive keyword, stored lowercased.
    Keyword(String),
    /// Any of a set of case-insensitive patterns.
    Patterns(Vec<Regex>),
}

impl LinePredicate {
    #[must_use]
    pub fn substring(term: impl Into<String>) -> Self {
        Self::Substring(term.into())
    }

    /// Case-insensitive `error` keyword.
    #[must_use]
    pub fn error_keyword() -> Self {
        Self::Keyword(DEFAULT_ERROR_PATTERN.to_string())
    }

    /// Compile case-insensitive patterns.
    ///
    /// An empty list falls back to [`LinePredicate::error_keyword`].
    ///
    /// # Errors
    ///
    /// Returns `MatcherError::InvalidPattern` if any pattern fails to compile.
    pub fn patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, MatcherError> {
        if patterns.is_empty() {
            return Ok(Self::error_keyword());
        }
        let compiled = patterns
            .iter()
            .map(|p| RegexBuilder::new(p.as_ref()).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Patterns(compiled))
    }

    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Substring(term) => line.contains(term.as_str()),
            Self::Keyword(keyword) => line.to_lowercase().contains(keyword.as_str()),
            Self::Patterns(patterns) => patterns.iter().any(|p| p.is_match(line)),
        }
    }
}
