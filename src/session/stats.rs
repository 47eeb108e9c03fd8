use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use super::state::SessionState;

/// Statistics about a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Unique session identifier
    pub session_id: String,

    /// Controller state when the snapshot was taken
    pub state: SessionState,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Seconds since the session started (or its total length once stopped)
    pub duration_secs: f64,

    /// Successful reads from the frame source
    pub frames_read: u64,

    /// Reads that returned no data or an error
    pub reads_failed: u64,

    /// Frames the gate accepted as voice
    pub frames_voiced: u64,

    /// Frames the gate rejected
    pub frames_discarded: u64,

    /// Segments handed to the sink successfully
    pub segments_flushed: u64,

    /// Segments the sink failed to persist
    pub segments_failed: u64,

    /// Samples persisted across all flushed segments
    pub samples_flushed: u64,

    /// Voiced samples still unflushed when the session stopped
    pub tail_samples_discarded: u64,

    /// Most recent sink failure, if any
    pub last_error: Option<String>,
}

/// Live counters shared between the capture thread and the controller
///
/// The capture thread is the only writer.
#[derive(Debug, Default)]
pub struct SessionCounters {
    frames_read: AtomicU64,
    reads_failed: AtomicU64,
    frames_voiced: AtomicU64,
    frames_discarded: AtomicU64,
    segments_flushed: AtomicU64,
    segments_failed: AtomicU64,
    samples_flushed: AtomicU64,
    tail_samples_discarded: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.reads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_voiced(&self) {
        self.frames_voiced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, samples: usize) {
        self.segments_flushed.fetch_add(1, Ordering::Relaxed);
        self.samples_flushed.fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn record_flush_failure(&self, error: &anyhow::Error) {
        self.segments_failed.fetch_add(1, Ordering::Relaxed);
        let mut last_error = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
        *last_error = Some(format!("{:#}", error));
    }

    pub fn record_tail_discarded(&self, samples: usize) {
        self.tail_samples_discarded
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn segments_flushed(&self) -> u64 {
        self.segments_flushed.load(Ordering::Relaxed)
    }

    pub fn segments_failed(&self) -> u64 {
        self.segments_failed.load(Ordering::Relaxed)
    }

    /// Build a stats snapshot for a session
    pub fn snapshot(
        &self,
        session_id: &str,
        state: SessionState,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
    ) -> SessionStats {
        let end = ended_at.unwrap_or_else(Utc::now);
        let duration = end.signed_duration_since(started_at);

        SessionStats {
            session_id: session_id.to_string(),
            state,
            started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_read: self.frames_read.load(Ordering::Relaxed),
            reads_failed: self.reads_failed.load(Ordering::Relaxed),
            frames_voiced: self.frames_voiced.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            segments_flushed: self.segments_flushed.load(Ordering::Relaxed),
            segments_failed: self.segments_failed.load(Ordering::Relaxed),
            samples_flushed: self.samples_flushed.load(Ordering::Relaxed),
            tail_samples_discarded: self.tail_samples_discarded.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let counters = SessionCounters::new();
        counters.record_read();
        counters.record_read();
        counters.record_voiced();
        counters.record_discarded();
        counters.record_flush(16_000);
        counters.record_flush_failure(&anyhow::anyhow!("disk full"));

        let started_at = Utc::now();
        let stats = counters.snapshot("s-1", SessionState::Recording, started_at, Some(started_at));

        assert_eq!(stats.session_id, "s-1");
        assert_eq!(stats.frames_read, 2);
        assert_eq!(stats.frames_voiced, 1);
        assert_eq!(stats.frames_discarded, 1);
        assert_eq!(stats.segments_flushed, 1);
        assert_eq!(stats.samples_flushed, 16_000);
        assert_eq!(stats.segments_failed, 1);
        assert_eq!(stats.last_error.as_deref(), Some("disk full"));
        assert_eq!(stats.duration_secs, 0.0);
    }
}
