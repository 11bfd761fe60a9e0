//! Session state machine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::tail::ChangeEvent;

/// Lifecycle phase of a monitor session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No file selected.
    #[default]
    Idle,
    /// File selected and read once.
    Loaded,
    /// Poll loop running.
    Following,
    /// Following, but the last tick could not read the file.
    FileGone,
}

impl SessionPhase {
    #[must_use]
    pub fn is_following(self) -> bool {
        matches!(self, Self::Following | Self::FileGone)
    }
}

/// Snapshot of a session's externally visible state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_file: Option<PathBuf>,
    pub follow_enabled: bool,
    pub search_term: Option<String>,
    pub phase: SessionPhase,
}

/// Tracks the phase and tick counters.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    ticks: usize,
    failed_ticks: usize,
}

impl SessionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn transition(&mut self, new_phase: SessionPhase) {
        if self.phase != new_phase {
            tracing::debug!(from = ?self.phase, to = ?new_phase, "Session transition");
        }
        self.phase = new_phase;
    }

    /// Fold one tick into the phase.
    ///
    /// Only a following session moves between `Following` and `FileGone`; a
    /// failed manual reload leaves `Loaded` alone.
    pub fn record_tick(&mut self, event: &ChangeEvent) {
        self.ticks = self.ticks.saturating_add(1);
        if event.is_failure() {
            self.failed_ticks = self.failed_ticks.saturating_add(1);
        }
        match (self.phase, event.is_failure()) {
            (SessionPhase::Following, true) => {
                tracing::warn!(event = %event, "Followed file is gone");
                self.transition(SessionPhase::FileGone);
            }
            (SessionPhase::FileGone, false) => {
                tracing::info!(event = %event, "Followed file is back");
                self.transition(SessionPhase::Following);
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            ticks: self.ticks,
            failed_ticks: self.failed_ticks,
        }
    }
}

/// Tick counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: usize,
    pub failed_ticks: usize,
}
