use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Prefix of every generated segment name
pub const SEGMENT_PREFIX: &str = "recordedVoice";

/// Generates `recordedVoice_<unixMillis>.<ext>` names, unique per flush
///
/// Timestamps come from the wall clock but never repeat or go backwards:
/// if the clock has not advanced past the previous name, the previous
/// timestamp plus one is used instead. Clones share the same clock, so
/// one namer handed to every session keeps names unique across restarts.
#[derive(Debug, Clone)]
pub struct SegmentNamer {
    last_ms: Arc<AtomicI64>,
}

impl SegmentNamer {
    pub fn new() -> Self {
        Self {
            last_ms: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }

    /// Name for the next flushed segment
    pub fn next_name(&self, extension: &str) -> String {
        self.next_name_at(Utc::now().timestamp_millis(), extension)
    }

    fn next_name_at(&self, now_ms: i64, extension: &str) -> String {
        let advance = |last: i64| if now_ms <= last { last + 1 } else { now_ms };
        let last = self
            .last_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(advance(last)))
            .unwrap_or_else(|last| last);
        format!("{}_{}.{}", SEGMENT_PREFIX, advance(last), extension)
    }
}

impl Default for SegmentNamer {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the timestamp back out of a generated name
pub fn segment_timestamp(name: &str) -> Option<i64> {
    let rest = name.strip_prefix(SEGMENT_PREFIX)?.strip_prefix('_')?;
    let (millis, _ext) = rest.split_once('.')?;
    millis.parse().ok()
}
