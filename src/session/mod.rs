//! Capture session data
//!
//! This module provides the types describing one `start()`…`stop()` pairing:
//! - `RecorderConfig`: immutable per-session settings
//! - `SessionState`: the controller's lifecycle state machine
//! - `SessionStats`: counters reported while and after a session runs

mod config;
mod state;
mod stats;

pub use config::RecorderConfig;
pub use state::SessionState;
pub use stats::{SessionCounters, SessionStats};
