use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::SegmentFormat;
use crate::error::{RecorderError, Result};

/// Configuration for one capture session
///
/// Read once by `VoiceRecorder::start` and never changed while the session runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Samples requested per read (one frame)
    pub frame_size: usize,

    /// Flush a segment once it holds this many seconds of voiced audio
    pub max_segment_duration_secs: u32,

    /// On-disk layout of flushed segments
    #[serde(default)]
    pub format: SegmentFormat,
}

impl RecorderConfig {
    /// Capture is always mono
    pub const CHANNELS: u16 = 1;

    /// Capture is always 16-bit signed PCM
    pub const BITS_PER_SAMPLE: u16 = 16;

    pub fn new(sample_rate: u32, frame_size: usize, max_segment_duration_secs: u32) -> Self {
        Self {
            sample_rate,
            frame_size,
            max_segment_duration_secs,
            format: SegmentFormat::default(),
        }
    }

    pub fn with_format(mut self, format: SegmentFormat) -> Self {
        self.format = format;
        self
    }

    /// Check every value is usable before a session starts
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(RecorderError::InvalidConfig("sample_rate must be > 0".into()));
        }
        if self.frame_size == 0 {
            return Err(RecorderError::InvalidConfig("frame_size must be > 0".into()));
        }
        if self.max_segment_duration_secs == 0 {
            return Err(RecorderError::InvalidConfig(
                "max_segment_duration_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Accumulated samples at which a segment is flushed
    pub fn flush_threshold(&self) -> usize {
        self.max_segment_duration_secs as usize * self.sample_rate as usize
    }

    /// Wall-clock length of one full frame
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate as f64)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,            // VAD engines expect 16kHz
            frame_size: 320,               // 20ms at 16kHz
            max_segment_duration_secs: 30, // 30 seconds
            format: SegmentFormat::Raw,
        }
    }
}
