//! Monitor session: one current file, its tail engine and its matchers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::bookmarks::BookmarkStore;
use crate::config::MonitorConfig;
use crate::matcher::{LineMatcher, LinePredicate, LineScanner, MatchResult};
use crate::tail::{ChangeEvent, FileSnapshot, TailEngine, TailError, TailUpdate};

use super::error::SessionError;
use super::state::{SessionPhase, SessionState, SessionStateMachine, SessionStats};

/// Content of a freshly selected file.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub path: PathBuf,
    pub text: Arc<str>,
    /// File size at the time of the read.
    pub size: u64,
}

/// Published to session subscribers on every tick.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub path: PathBuf,
    pub content: Arc<str>,
    pub event: ChangeEvent,
    /// Current search result after applying the tick.
    pub matches: MatchResult,
    pub phase: SessionPhase,
}

/// State written by the engine callback and read by the session handle.
struct Shared {
    machine: SessionStateMachine,
    content: Arc<str>,
    search: Option<LineScanner>,
    subscribers: Vec<mpsc::UnboundedSender<SessionUpdate>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            machine: SessionStateMachine::new(),
            content: Arc::from(""),
            search: None,
            subscribers: Vec::new(),
        }
    }

    fn matches(&self) -> MatchResult {
        self.search
            .as_ref()
            .map_or(MatchResult::NotSearched, LineScanner::result)
    }

    fn replace_content(&mut self, content: Arc<str>) {
        if let Some(scanner) = self.search.as_mut() {
            scanner.rescan(&content);
        }
        self.content = content;
    }

    /// Fold a tick into the session and fan it out.
    fn apply(&mut self, update: &TailUpdate) {
        if let Some(scanner) = self.search.as_mut() {
            if let Some(replacement) = update.event.replacement() {
                scanner.rescan(replacement);
            } else if let Some(delta) = update.event.appended() {
                scanner.feed(delta);
            }
        }
        self.content = Arc::clone(&update.content);
        self.machine.record_tick(&update.event);

        let message = SessionUpdate {
            path: update.path.clone(),
            content: Arc::clone(&self.content),
            event: update.event.clone(),
            matches: self.matches(),
            phase: self.machine.phase(),
        };
        self.subscribers.retain(|tx| tx.send(message.clone()).is_ok());
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().expect("session state mutex poisoned")
}

/// Binds one current file to a [`TailEngine`] and the line matchers.
///
/// Selecting a file replaces the engine; the previous engine is stopped
/// before the new one can publish, so subscribers only ever see one file.
pub struct MonitorSession {
    config: MonitorConfig,
    errors: LinePredicate,
    bookmarks: BookmarkStore,
    current: Option<PathBuf>,
    follow: bool,
    search_term: Option<String>,
    engine: Option<TailEngine>,
    shared: Arc<Mutex<Shared>>,
}

impl MonitorSession {
    /// Create a session using an already opened bookmark store.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Pattern` if a configured error pattern is
    /// invalid.
    pub fn new(config: MonitorConfig, bookmarks: BookmarkStore) -> Result<Self, SessionError> {
        let errors = config.error_predicate()?;
        Ok(Self {
            config,
            errors,
            bookmarks,
            current: None,
            follow: false,
            search_term: None,
            engine: None,
            shared: Arc::new(Mutex::new(Shared::new())),
        })
    }

    /// Create a session with the bookmark store from the configured data
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the bookmark document cannot be loaded or an error
    /// pattern is invalid.
    pub fn open(config: MonitorConfig) -> Result<Self, SessionError> {
        let bookmarks = BookmarkStore::open(config.bookmarks_path())?;
        Self::new(config, bookmarks)
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Make `path` the current file and read it.
    ///
    /// On failure the previous file stays selected and keeps being followed.
    /// When follow is enabled the new file is followed immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be stat'ed or read, or if its poll
    /// thread cannot be started.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    pub fn select_file(&mut self, path: impl AsRef<Path>) -> Result<FileContent, SessionError> {
        let path = path.as_ref().to_path_buf();
        FileSnapshot::capture(&path).map_err(|e| TailError::from_io(&path, e))?;

        let engine = TailEngine::with_detector(&path, self.config.detector())
            .with_wake_on_change(self.config.wake_on_change);
        let first = engine.prime();
        if let ChangeEvent::Missing { reason } | ChangeEvent::Unreadable { reason } = first.event {
            return Err(SessionError::Unreadable { path, reason });
        }

        // Old engine must be gone before the new one is wired up.
        self.engine = None;

        let shared = Arc::clone(&self.shared);
        engine.on_event(move |update| {
            lock(&shared).apply(update);
        });
        {
            let mut shared = lock(&self.shared);
            shared.replace_content(Arc::clone(&first.content));
            shared.machine.transition(SessionPhase::Loaded);
        }

        let size = engine.snapshot().map_or(0, |s| s.size());
        tracing::info!(path = %path.display(), size, "File selected");
        self.current = Some(path.clone());
        self.engine = Some(engine);

        if self.follow {
            self.start_following()?;
        }

        Ok(FileContent {
            path,
            text: first.content,
            size,
        })
    }

    /// Run one tick on the calling thread.
    ///
    /// Subscribers receive the update as they would from the poll loop.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoFileSelected` without a current file.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    pub fn reload(&self) -> Result<SessionUpdate, SessionError> {
        let engine = self.engine.as_ref().ok_or(SessionError::NoFileSelected)?;
        let update = engine.tick();
        let shared = lock(&self.shared);
        Ok(SessionUpdate {
            path: update.path,
            content: update.content,
            event: update.event,
            matches: shared.matches(),
            phase: shared.machine.phase(),
        })
    }

    /// Turn following on or off.
    ///
    /// The flag is kept without a current file and takes effect on the next
    /// selection. Turning follow off keeps the current file and its content.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll thread cannot be started.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    pub fn set_follow(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.follow = enabled;
        if enabled {
            return self.start_following();
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
            lock(&self.shared).machine.transition(SessionPhase::Loaded);
            tracing::debug!("Follow disabled");
        }
        Ok(())
    }

    fn start_following(&mut self) -> Result<(), SessionError> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };
        if engine.is_running() {
            return Ok(());
        }

        lock(&self.shared).machine.transition(SessionPhase::Following);
        if let Err(e) = engine.resume(self.config.poll_interval()) {
            lock(&self.shared).machine.transition(SessionPhase::Loaded);
            self.follow = false;
            return Err(e.into());
        }
        Ok(())
    }

    /// Set the search term and re-scan what has been captured.
    ///
    /// The term is trimmed; an empty term clears the search.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    pub fn set_search_term(&mut self, term: &str) -> MatchResult {
        let term = term.trim();
        let mut shared = lock(&self.shared);
        if term.is_empty() {
            self.search_term = None;
            shared.search = None;
            return MatchResult::NotSearched;
        }

        self.search_term = Some(term.to_string());
        let mut scanner = LineMatcher::search(term, self.config.match_window).into_scanner();
        scanner.feed(&shared.content);
        shared.search = Some(scanner);
        if self.current.is_none() {
            return MatchResult::NotSearched;
        }
        shared.matches()
    }

    /// Current search result.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    #[must_use]
    pub fn matches(&self) -> MatchResult {
        if self.current.is_none() {
            return MatchResult::NotSearched;
        }
        lock(&self.shared).matches()
    }

    /// Distinct error lines of the captured content, in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoFileSelected` without a current file.
    pub fn analyze_errors(&self) -> Result<MatchResult, SessionError> {
        if self.current.is_none() {
            return Err(SessionError::NoFileSelected);
        }
        let content = self.content();
        let result = LineMatcher::errors(self.errors.clone()).scan(&content);
        tracing::debug!(distinct = result.len(), "Error analysis complete");
        Ok(result)
    }

    #[must_use]
    pub fn list_bookmarks(&self) -> &[PathBuf] {
        self.bookmarks.list()
    }

    #[must_use]
    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    /// # Errors
    ///
    /// Returns `BookmarkError::AlreadyExists` for a duplicate, or an error if
    /// the store cannot be written.
    pub fn add_bookmark(&mut self, path: impl Into<PathBuf>) -> Result<(), SessionError> {
        Ok(self.bookmarks.add(path)?)
    }

    /// Bookmark the current file.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoFileSelected` without a current file, or any
    /// error from [`MonitorSession::add_bookmark`].
    pub fn bookmark_current(&mut self) -> Result<PathBuf, SessionError> {
        let path = self.current.clone().ok_or(SessionError::NoFileSelected)?;
        self.bookmarks.add(path.clone())?;
        Ok(path)
    }

    /// Remove a bookmark. Removing an absent path is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn remove_bookmark(&mut self, path: &Path) -> Result<bool, SessionError> {
        Ok(self.bookmarks.remove(path)?)
    }

    /// Select a bookmarked file.
    ///
    /// A bookmark whose file no longer exists is removed and reported as
    /// `BookmarkError::NotFound`.
    ///
    /// # Errors
    ///
    /// Returns a bookmark error if the path is unknown or gone, or any error
    /// from [`MonitorSession::select_file`].
    pub fn open_bookmark(&mut self, path: &Path) -> Result<FileContent, SessionError> {
        let path = self.bookmarks.access(path)?;
        self.select_file(path)
    }

    /// Receive an update for every tick of the current file.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.shared).subscribers.push(tx);
        rx
    }

    /// Drop the current file and stop its engine. Follow and search settings
    /// are kept.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    pub fn clear(&mut self) {
        self.engine = None;
        self.current = None;
        let mut shared = lock(&self.shared);
        shared.replace_content(Arc::from(""));
        shared.machine.transition(SessionPhase::Idle);
        tracing::debug!("Session cleared");
    }

    /// Current state as a value.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState {
            current_file: self.current.clone(),
            follow_enabled: self.follow,
            search_term: self.search_term.clone(),
            phase: lock(&self.shared).machine.phase(),
        }
    }

    /// Everything captured from the current file.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    #[must_use]
    pub fn content(&self) -> Arc<str> {
        Arc::clone(&lock(&self.shared).content)
    }

    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        lock(&self.shared).machine.stats()
    }
}

impl std::fmt::Debug for MonitorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSession")
            .field("current", &self.current)
            .field("follow", &self.follow)
            .field("search_term", &self.search_term)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
