//! Line scanning over full buffers and appended deltas.

use std::collections::{HashSet, VecDeque};

use super::predicate::LinePredicate;
use super::result::MatchResult;

/// Number of search matches kept by default.
pub const DEFAULT_MATCH_WINDOW: usize = 5;

/// How matching lines are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Keep the most recent `window` matches, duplicates included.
    Recent { window: usize },
    /// Keep every distinct matching line once, in first-seen order.
    Distinct,
}

/// A predicate plus a collection mode.
#[derive(Debug, Clone)]
pub struct LineMatcher {
    predicate: LinePredicate,
    mode: MatchMode,
}

impl LineMatcher {
    #[must_use]
    pub fn new(predicate: LinePredicate, mode: MatchMode) -> Self {
        let mode = match mode {
            MatchMode::Recent { window } => MatchMode::Recent {
                window: window.max(1),
            },
            MatchMode::Distinct => MatchMode::Distinct,
        };
        Self { predicate, mode }
    }

    /// Substring search keeping the last `window` matches.
    #[must_use]
    pub fn search(term: impl Into<String>, window: usize) -> Self {
        Self::new(LinePredicate::substring(term), MatchMode::Recent { window })
    }

    /// Distinct error lines.
    #[must_use]
    pub fn errors(predicate: LinePredicate) -> Self {
        Self::new(predicate, MatchMode::Distinct)
    }

    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    #[must_use]
    pub fn predicate(&self) -> &LinePredicate {
        &self.predicate
    }

    /// Scan a complete buffer.
    #[must_use]
    pub fn scan(&self, content: &str) -> MatchResult {
        let mut scanner = self.clone().into_scanner();
        scanner.feed(content);
        scanner.result()
    }

    /// Start an incremental scan.
    #[must_use]
    pub fn into_scanner(self) -> LineScanner {
        LineScanner::new(self)
    }
}

/// Incremental scanner fed with appended text.
///
/// Text after the last newline is held as a partial line: it takes part in
/// [`LineScanner::result`] but is only committed once its newline arrives, so
/// a line split across two deltas is matched once.
#[derive(Debug, Clone)]
pub struct LineScanner {
    matcher: LineMatcher,
    partial: String,
    recent: VecDeque<String>,
    seen: HashSet<String>,
    distinct: Vec<String>,
    lines_scanned: usize,
}

impl LineScanner {
    #[must_use]
    pub fn new(matcher: LineMatcher) -> Self {
        Self {
            matcher,
            partial: String::new(),
            recent: VecDeque::new(),
            seen: HashSet::new(),
            distinct: Vec::new(),
            lines_scanned: 0,
        }
    }

    #[must_use]
    pub fn matcher(&self) -> &LineMatcher {
        &self.matcher
    }

    /// Number of complete lines scanned so far.
    #[must_use]
    pub fn lines_scanned(&self) -> usize {
        self.lines_scanned
    }

    /// Drop everything scanned so far.
    pub fn reset(&mut self) {
        self.partial.clear();
        self.recent.clear();
        self.seen.clear();
        self.distinct.clear();
        self.lines_scanned = 0;
    }

    /// Reset and scan `content` from scratch.
    pub fn rescan(&mut self, content: &str) {
        self.reset();
        self.feed(content);
    }

    /// Scan appended text.
    pub fn feed(&mut self, delta: &str) {
        let mut rest = delta;
        while let Some(newline) = rest.find('\n') {
            let (head, tail) = rest.split_at(newline);
            rest = &tail[1..];
            if self.partial.is_empty() {
                self.commit(head);
            } else {
                let mut line = std::mem::take(&mut self.partial);
                line.push_str(head);
                self.commit(&line);
            }
        }
        self.partial.push_str(rest);
    }

    /// Current matches, including a matching partial last line.
    #[must_use]
    pub fn result(&self) -> MatchResult {
        let tail = self
            .matches(&self.partial)
            .then(|| self.partial.trim().to_string());

        let lines = match self.matcher.mode {
            MatchMode::Recent { window } => {
                let mut lines: Vec<String> = self.recent.iter().cloned().collect();
                lines.extend(tail);
                let excess = lines.len().saturating_sub(window);
                lines.drain(..excess);
                lines
            }
            MatchMode::Distinct => {
                let mut lines = self.distinct.clone();
                lines.extend(tail.filter(|t| !self.seen.contains(t)));
                lines
            }
        };
        MatchResult::from_lines(lines)
    }

    fn matches(&self, line: &str) -> bool {
        !line.is_empty() && self.matcher.predicate.matches(line.trim_end_matches('\r'))
    }

    fn commit(&mut self, line: &str) {
        self.lines_scanned += 1;
        if !self.matches(line) {
            return;
        }
        let trimmed = line.trim().to_string();
        match self.matcher.mode {
            MatchMode::Recent { window } => {
                if self.recent.len() == window {
                    self.recent.pop_front();
                }
                self.recent.push_back(trimmed);
            }
            MatchMode::Distinct => {
                if self.seen.insert(trimmed.clone()) {
                    self.distinct.push(trimmed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> String {
        (1..=count).map(|i| format!("ERR {i}\nok {i}\n")).collect()
    }

    #[test]
    fn test_search_keeps_last_five_in_order() {
        let result = LineMatcher::search("ERR", DEFAULT_MATCH_WINDOW).scan(&numbered(7));
        assert_eq!(
            result.lines(),
            ["ERR 3", "ERR 4", "ERR 5", "ERR 6", "ERR 7"]
        );
    }

    #[test]
    fn test_search_keeps_duplicates() {
        let content = "ERR same\nERR same\n";
        let result = LineMatcher::search("ERR", 5).scan(content);
        assert_eq!(result.lines(), ["ERR same", "ERR same"]);
    }

    #[test]
    fn test_empty_content_is_no_matches() {
        let result = LineMatcher::search("ERR", 5).scan("");
        assert_eq!(result, MatchResult::NoMatches);
        let result = LineMatcher::errors(LinePredicate::error_keyword()).scan("");
        assert_eq!(result, MatchResult::NoMatches);
    }

    #[test]
    fn test_distinct_errors_first_seen_order() {
        let content = "Error: b\ninfo\nERROR a\nError: b\n  Error: b  \nerror c\n";
        let result = LineMatcher::errors(LinePredicate::error_keyword()).scan(content);
        assert_eq!(result.lines(), ["Error: b", "ERROR a", "error c"]);
    }

    #[test]
    fn test_partial_line_counts_once() {
        let mut scanner = LineMatcher::search("ERR", 5).into_scanner();
        scanner.feed("ok\nER");
        assert_eq!(scanner.result(), MatchResult::NoMatches);

        scanner.feed("R split");
        assert_eq!(scanner.result().lines(), ["ERR split"]);

        scanner.feed(" done\n");
        assert_eq!(scanner.result().lines(), ["ERR split done"]);
        assert_eq!(scanner.lines_scanned(), 2);
    }

    #[test]
    fn test_incremental_matches_full_scan() {
        let content = numbered(9);
        let matcher = LineMatcher::search("ERR", 5);
        let mut scanner = matcher.clone().into_scanner();
        for chunk in content.as_bytes().chunks(7) {
            scanner.feed(std::str::from_utf8(chunk).unwrap());
        }
        assert_eq!(scanner.result(), matcher.scan(&content));
    }

    #[test]
    fn test_distinct_partial_line_not_duplicated() {
        let mut scanner = LineMatcher::errors(LinePredicate::error_keyword()).into_scanner();
        scanner.feed("error x\nerror x");
        assert_eq!(scanner.result().lines(), ["error x"]);
    }

    #[test]
    fn test_rescan_resets() {
        let mut scanner = LineMatcher::search("ERR", 5).into_scanner();
        scanner.feed("ERR old\n");
        scanner.rescan("ERR new\n");
        assert_eq!(scanner.result().lines(), ["ERR new"]);
    }

    #[test]
    fn test_crlf_lines_are_trimmed() {
        let result = LineMatcher::search("ERR", 5).scan("ERR one\r\nERR two\r\n");
        assert_eq!(result.lines(), ["ERR one", "ERR two"]);
    }

    #[test]
    fn test_zero_window_is_clamped() {
        let matcher = LineMatcher::search("x", 0);
        assert_eq!(matcher.mode(), MatchMode::Recent { window: 1 });
    }
}
