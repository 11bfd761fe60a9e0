//! Poll-driven file tailer.
//!
//! A [`TailEngine`] owns the poll cycle for one path. Each tick captures a
//! fresh [`FileSnapshot`], hands it to the [`ChangeDetector`] together with the
//! previous one, folds the result into the captured content and publishes a
//! [`TailUpdate`] to every subscriber.
//!
//! Ticks can be driven two ways:
//! - by the host, calling [`TailEngine::tick`] from its own loop;
//! - by a dedicated poll thread started with [`TailEngine::start`].
//!
//! The tick holds the engine mutex from capture to publish. That serializes
//! ticks for a path and lets [`TailEngine::stop`] guarantee that nothing is
//! delivered once it returns.

use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::detector::{ChangeDetector, ChangeEvent};
use super::error::TailError;
use super::snapshot::FileSnapshot;
use super::wake::ChangeWaker;

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Shortest interval the poll thread accepts.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One published tick.
#[derive(Debug, Clone)]
pub struct TailUpdate {
    /// Path that was polled.
    pub path: PathBuf,
    /// What the tick observed.
    pub event: ChangeEvent,
    /// Everything captured so far, after applying the event.
    pub content: Arc<str>,
}

/// Subscriber callback. Returning `false` unsubscribes.
type Subscriber = Box<dyn FnMut(&TailUpdate) -> bool + Send>;

/// Control messages for the poll thread.
#[derive(Debug, Clone, Copy)]
enum Signal {
    Stop,
    Wake,
}

/// State shared between the engine handle and its poll thread.
struct TailState {
    path: PathBuf,
    detector: ChangeDetector,
    previous: Option<FileSnapshot>,
    content: Arc<str>,
    /// Set after a tick found the path missing; the next successful capture
    /// is reported as a rotation.
    missing: bool,
    subscribers: Vec<Subscriber>,
}

impl TailState {
    fn new(path: PathBuf, detector: ChangeDetector) -> Self {
        Self {
            path,
            detector,
            previous: None,
            content: Arc::from(""),
            missing: false,
            subscribers: Vec::new(),
        }
    }

    /// Forget everything learned about the current path.
    fn rebind(&mut self, path: PathBuf) {
        self.path = path;
        self.previous = None;
        self.content = Arc::from("");
        self.missing = false;
    }

    /// Run one capture/detect cycle and update the captured content.
    fn poll(&mut self) -> TailUpdate {
        let event = match self.observe() {
            Ok(event) => event,
            Err(err) => {
                if err.is_missing() {
                    self.missing = true;
                }
                tracing::debug!(path = %self.path.display(), error = %err, "Tick failed");
                ChangeEvent::from_error(&err)
            }
        };

        if let Some(replacement) = event.replacement() {
            self.content = Arc::from(replacement);
        } else if let Some(delta) = event.appended() {
            let mut content = String::with_capacity(self.content.len() + delta.len());
            content.push_str(&self.content);
            content.push_str(delta);
            self.content = Arc::from(content);
        }

        TailUpdate {
            path: self.path.clone(),
            event,
            content: Arc::clone(&self.content),
        }
    }

    fn observe(&mut self) -> Result<ChangeEvent, TailError> {
        let current =
            FileSnapshot::capture(&self.path).map_err(|e| TailError::from_io(&self.path, e))?;

        if self.missing {
            // The path vanished and came back: whatever is there now is a
            // different file as far as our offsets are concerned.
            let detection = self.detector.detect(None, current, "")?;
            self.missing = false;
            let identity = detection.snapshot.identity();
            let content = detection
                .event
                .replacement()
                .unwrap_or_default()
                .to_string();
            tracing::info!(path = %self.path.display(), "Tracked file reappeared");
            self.previous = Some(detection.snapshot);
            return Ok(ChangeEvent::Rotated { content, identity });
        }

        let detection = self
            .detector
            .detect(self.previous.as_ref(), current, &self.content)?;
        if matches!(
            detection.event,
            ChangeEvent::Truncated { .. } | ChangeEvent::Rotated { .. }
        ) {
            tracing::info!(
                path = %self.path.display(),
                event = %detection.event,
                "Tracked file replaced, re-read from start"
            );
        }
        self.previous = Some(detection.snapshot);
        Ok(detection.event)
    }

    fn publish(&mut self, update: &TailUpdate) {
        self.subscribers.retain_mut(|subscriber| subscriber(update));
    }
}

/// Handle to a running poll thread.
struct Poller {
    control: std_mpsc::Sender<Signal>,
    handle: JoinHandle<()>,
    waker: Option<ChangeWaker>,
}

/// Tails one file, by host-driven ticks or by its own poll thread.
pub struct TailEngine {
    state: Arc<Mutex<TailState>>,
    poller: Option<Poller>,
    wake_on_change: bool,
}

impl TailEngine {
    /// Create an engine bound to `path`. Nothing is read until the first tick.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_detector(path, ChangeDetector::new())
    }

    /// Create an engine with a configured detector.
    #[must_use]
    pub fn with_detector(path: impl Into<PathBuf>, detector: ChangeDetector) -> Self {
        Self {
            state: Arc::new(Mutex::new(TailState::new(path.into(), detector))),
            poller: None,
            wake_on_change: false,
        }
    }

    /// Also wake the poll thread on filesystem events for the path.
    #[must_use]
    pub fn with_wake_on_change(mut self, enabled: bool) -> Self {
        self.wake_on_change = enabled;
        self
    }

    /// Path the engine is bound to.
    ///
    /// # Panics
    ///
    /// Panics if the engine mutex is poisoned.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Everything captured so far.
    ///
    /// # Panics
    ///
    /// Panics if the engine mutex is poisoned.
    #[must_use]
    pub fn content(&self) -> Arc<str> {
        Arc::clone(&self.lock().content)
    }

    /// The latest snapshot, if any tick has succeeded.
    ///
    /// # Panics
    ///
    /// Panics if the engine mutex is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> Option<FileSnapshot> {
        self.lock().previous.clone()
    }

    /// Register a callback invoked with every published update.
    ///
    /// Callbacks run on whichever thread drives the tick, with the engine
    /// locked; they must not call back into this engine.
    ///
    /// # Panics
    ///
    /// Panics if the engine mutex is poisoned.
    pub fn on_event<F>(&self, mut callback: F)
    where
        F: FnMut(&TailUpdate) + Send + 'static,
    {
        self.lock().subscribers.push(Box::new(move |update| {
            callback(update);
            true
        }));
    }

    /// Subscribe through a channel. The subscription ends when the receiver
    /// is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the engine mutex is poisoned.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TailUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()
            .subscribers
            .push(Box::new(move |update| tx.send(update.clone()).is_ok()));
        rx
    }

    /// Run one tick on the calling thread and publish its update.
    ///
    /// Read failures are reported as [`ChangeEvent::Missing`] or
    /// [`ChangeEvent::Unreadable`]; they never abort the engine.
    ///
    /// # Panics
    ///
    /// Panics if the engine mutex is poisoned.
    pub fn tick(&self) -> TailUpdate {
        tick(&self.state)
    }

    /// Run one tick without notifying subscribers.
    ///
    /// Used to take the initial read before anyone is listening.
    ///
    /// # Panics
    ///
    /// Panics if the engine mutex is poisoned.
    pub fn prime(&self) -> TailUpdate {
        self.lock().poll()
    }

    /// Start polling `path` every `interval` on a dedicated thread.
    ///
    /// A running poll loop is stopped first, so there is never more than one.
    /// Starting on a different path rebinds the engine and forgets the
    /// previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll thread cannot be spawned.
    ///
    /// # Panics
    ///
    /// Panics if the engine mutex is poisoned.
    pub fn start(&mut self, path: &Path, interval: Duration) -> Result<(), TailError> {
        self.stop();
        {
            let mut state = self.lock();
            if state.path != path {
                tracing::debug!(from = %state.path.display(), to = %path.display(), "Rebinding tail engine");
                state.rebind(path.to_path_buf());
            }
        }
        self.spawn(path, interval.max(MIN_POLL_INTERVAL))
    }

    /// Start polling the bound path.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll thread cannot be spawned.
    ///
    /// # Panics
    ///
    /// Panics if the engine mutex is poisoned.
    pub fn resume(&mut self, interval: Duration) -> Result<(), TailError> {
        let path = self.path();
        self.start(&path, interval)
    }

    fn spawn(&mut self, path: &Path, interval: Duration) -> Result<(), TailError> {
        let (control, control_rx) = std_mpsc::channel();

        let waker = if self.wake_on_change {
            match ChangeWaker::watch(path, control.clone(), Signal::Wake) {
                Ok(waker) => Some(waker),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "File watcher unavailable, polling only");
                    None
                }
            }
        } else {
            None
        };

        let state = Arc::clone(&self.state);
        let handle = thread::Builder::new()
            .name("logkeeper-tail".to_string())
            .spawn(move || poll_loop(&state, &control_rx, interval))
            .map_err(TailError::Spawn)?;

        tracing::debug!(
            path = %path.display(),
            interval_ms = interval.as_millis(),
            "Tail engine started"
        );
        self.poller = Some(Poller {
            control,
            handle,
            waker,
        });
        Ok(())
    }

    /// Stop the poll thread, if any.
    ///
    /// Idempotent. When this returns from any thread other than the poll
    /// thread itself, the thread has exited and no further update will be
    /// published by it.
    pub fn stop(&mut self) {
        let Some(poller) = self.poller.take() else {
            return;
        };
        let _ = poller.control.send(Signal::Stop);
        drop(poller.waker);

        if poller.handle.thread().id() == thread::current().id() {
            return;
        }
        if poller.handle.join().is_err() {
            tracing::error!("Tail poll thread panicked");
        }
        tracing::debug!("Tail engine stopped");
    }

    /// Whether a poll thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.poller.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, TailState> {
        self.state.lock().expect("tail state mutex poisoned")
    }
}

impl Drop for TailEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TailEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailEngine")
            .field("running", &self.is_running())
            .field("wake_on_change", &self.wake_on_change)
            .finish_non_exhaustive()
    }
}

fn tick(state: &Mutex<TailState>) -> TailUpdate {
    let mut state = state.lock().expect("tail state mutex poisoned");
    let update = state.poll();
    state.publish(&update);
    update
}

/// Body of the poll thread.
///
/// Waits one interval (or a wake signal) between ticks. The wait starts after
/// a tick completes, so a slow read delays the schedule instead of queueing
/// ticks behind it.
fn poll_loop(state: &Mutex<TailState>, control: &std_mpsc::Receiver<Signal>, interval: Duration) {
    loop {
        match control.recv_timeout(interval) {
            Ok(Signal::Wake) | Err(std_mpsc::RecvTimeoutError::Timeout) => {
                let started = Instant::now();
                let update = tick(state);
                let elapsed = started.elapsed();
                if elapsed > interval {
                    tracing::warn!(
                        path = %update.path.display(),
                        elapsed_ms = elapsed.as_millis(),
                        interval_ms = interval.as_millis(),
                        "Tick overran poll interval"
                    );
                }
            }
            Ok(Signal::Stop) | Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
