//! Line matching for search and error analysis.
//!
//! Two modes share one scanner: search keeps the most recent matches of a
//! case-sensitive term, error analysis keeps each distinct error line once.
//! Both can be fed appended deltas instead of re-scanning the whole buffer.

mod predicate;
mod result;
mod scanner;

pub use predicate::{LinePredicate, MatcherError, DEFAULT_ERROR_PATTERN};
pub use result::MatchResult;
pub use scanner::{LineMatcher, LineScanner, MatchMode, DEFAULT_MATCH_WINDOW};
