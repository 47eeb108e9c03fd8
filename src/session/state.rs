use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a capture session, owned by the controller
///
/// `Idle → Recording → Stopping → Idle`. Only the controller moves between
/// states; the worker only ever sees the running flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
