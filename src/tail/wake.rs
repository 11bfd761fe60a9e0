//! Filesystem-event wakeups for the poll loop.
//!
//! Polling alone notices a change up to one interval late. When enabled, a
//! debounced notify watcher on the file's parent directory nudges the poll
//! thread as soon as the tracked file is touched. The poll loop still runs on
//! its schedule, so a watcher that misses events costs latency, not data.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};

use super::error::TailError;

/// Debounce window for filesystem events.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Keeps a notify watcher alive and forwards relevant events as wake signals.
pub(crate) struct ChangeWaker {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl ChangeWaker {
    /// Watch the parent directory of `path`, calling `wake` when it changes.
    ///
    /// The directory is watched instead of the file so that deletion and
    /// recreation at the same path are still observed.
    pub(crate) fn watch<S>(path: &Path, wake: Sender<S>, signal: S) -> Result<Self, TailError>
    where
        S: Clone + Send + 'static,
    {
        let file_name = path.file_name().map(ToOwned::to_owned);
        let target = watch_dir(path);

        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            let relevant = match result {
                Ok(events) => events.iter().any(|event| {
                    event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(ToOwned::to_owned) == file_name)
                }),
                Err(errors) => {
                    for error in errors {
                        tracing::debug!(error = %error, "File watcher error");
                    }
                    false
                }
            };
            if relevant {
                let _ = wake.send(signal.clone());
            }
        })?;

        debouncer.watch(&target, RecursiveMode::NonRecursive)?;
        tracing::debug!(dir = %target.display(), "Watching for file changes");

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

/// Directory to watch for `path`; bare file names live in the working directory.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
