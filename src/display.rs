//! Colored terminal output for the `logkeeper` binary.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use owo_colors::OwoColorize;

use crate::archive::BackupReport;
use crate::matcher::MatchResult;
use crate::session::{SessionPhase, SessionUpdate};
use crate::tail::ChangeEvent;

/// Longest event reason printed before truncation.
const MAX_REASON_LEN: usize = 120;

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Truncate to at most `max_len` characters, adding an ellipsis if cut.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let head: String = s.chars().take(max_len - 3).collect();
    format!("{head}...")
}

/// Print raw file content, adding a final newline if it lacks one.
pub fn print_content(content: &str) {
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(content.as_bytes());
    if !content.is_empty() && !content.ends_with('\n') {
        let _ = stdout.write_all(b"\n");
    }
    let _ = stdout.flush();
}

/// Print the header shown when a file is opened.
pub fn print_opened(path: &Path, size: u64) {
    eprintln!(
        "{} {} {} {}",
        timestamp().dimmed(),
        "[OPEN]".blue().bold(),
        path.display().cyan(),
        format!("({size} bytes)").dimmed()
    );
}

/// Print one followed tick.
///
/// Appended text goes to stdout as-is; everything else is a status line on
/// stderr, with the full content re-printed when it was replaced.
pub fn print_update(update: &SessionUpdate) {
    let ts = timestamp();
    match &update.event {
        ChangeEvent::Unchanged => {}
        ChangeEvent::Appended { text, .. } => print_content(text),
        ChangeEvent::Truncated { content }
        | ChangeEvent::Rotated { content, .. }
        | ChangeEvent::Rewritten { content } => {
            eprintln!(
                "{} {} {}",
                ts.dimmed(),
                "[RELOAD]".yellow().bold(),
                update.event
            );
            print_content(content);
        }
        ChangeEvent::Missing { reason } | ChangeEvent::Unreadable { reason } => {
            eprintln!(
                "{} {} {}",
                ts.dimmed(),
                "[GONE]".red().bold(),
                truncate(reason, MAX_REASON_LEN).red()
            );
        }
    }
    if update.phase == SessionPhase::FileGone && !update.event.is_failure() {
        eprintln!("{} {}", ts.dimmed(), "[WAITING]".yellow().bold());
    }
}

/// Print a match result under a heading.
pub fn print_matches(title: &str, result: &MatchResult) {
    match result {
        MatchResult::NotSearched => {}
        MatchResult::NoMatches => {
            println!("{} {}", format!("[{title}]").blue().bold(), "no matches".dimmed());
        }
        MatchResult::Lines(lines) => {
            println!(
                "{} {}",
                format!("[{title}]").blue().bold(),
                format!("{} line(s)", lines.len()).dimmed()
            );
            for line in lines {
                println!("  {}", line.yellow());
            }
        }
    }
    let _ = io::stdout().flush();
}

/// Print bookmarks, marking the ones whose file is missing.
pub fn print_bookmarks(bookmarks: &[PathBuf]) {
    if bookmarks.is_empty() {
        println!("{}", "No bookmarks".dimmed());
        return;
    }
    for (i, path) in bookmarks.iter().enumerate() {
        if path.exists() {
            println!("{:>3}. {}", i + 1, path.display().cyan());
        } else {
            println!(
                "{:>3}. {} {}",
                i + 1,
                path.display().dimmed(),
                "(missing)".red()
            );
        }
    }
}

/// Print the outcome of a backup.
pub fn print_backup(report: &BackupReport) {
    print_success(&format!("Backup written to {}", report.archive.display()));
    for name in &report.included {
        println!("  {} {}", "+".green(), name);
    }
    for path in &report.skipped {
        println!("  {} {} {}", "-".dimmed(), path.display(), "(not found)".dimmed());
    }
}

/// Print a success line.
pub fn print_success(message: &str) {
    println!("{} {}", "[OK]".green().bold(), message);
}

/// Print a warning on stderr.
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "[WARN]".yellow().bold(), message);
}

/// Print an error on stderr.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message.red());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly 10", 10), "exactly 10");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("abc", 2), "...");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }
}
