//! Monitor sessions.
//!
//! A session owns the current file, whether it is followed, the search term
//! and the bookmark store. Hosts drive it through plain method calls and
//! observe it through [`MonitorSession::subscribe`].

mod error;
mod monitor;
mod state;

pub use error::SessionError;
pub use monitor::{FileContent, MonitorSession, SessionUpdate};
pub use state::{SessionPhase, SessionState, SessionStateMachine, SessionStats};
