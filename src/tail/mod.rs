//! Live file tailing.
//!
//! Snapshots a file on every tick, classifies what changed since the previous
//! snapshot and reads only what that change requires.

mod detector;
mod engine;
mod error;
mod snapshot;
mod wake;

pub use detector::{ChangeDetector, ChangeEvent, ChangeKind, Detection};
pub use engine::{TailEngine, TailUpdate, DEFAULT_POLL_INTERVAL};
pub use error::TailError;
pub use snapshot::{FileIdentity, FileSnapshot};
