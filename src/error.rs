//! Errors reported by the recorder controller.
//!
//! Collaborators (sources, sinks) use `anyhow` with context; the controller
//! classifies their failures into [`RecorderError`] at the `start` boundary.

use thiserror::Error;

/// Errors returned by [`crate::VoiceRecorder::start`].
#[derive(Error, Debug)]
pub enum RecorderError {
    /// The configuration has a zero or otherwise unusable value.
    #[error("invalid recorder config: {0}")]
    InvalidConfig(String),

    /// The frame source could not be acquired (device unavailable or misconfigured).
    #[error("failed to acquire frame source")]
    Acquisition(#[source] anyhow::Error),

    /// The capture thread could not be spawned.
    #[error("failed to spawn capture thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// A convenience type alias for controller operations.
pub type Result<T> = std::result::Result<T, RecorderError>;
