//! Capture pipeline
//!
//! - `VoiceRecorder`: start/stop lifecycle, owns the capture thread and source
//! - `CaptureWorker`: blocking read → gate → segment → flush loop
//! - `SegmentNamer`: unique, time-ordered segment names

pub mod naming;
pub mod recorder;
pub mod worker;

pub use naming::{segment_timestamp, SegmentNamer, SEGMENT_PREFIX};
pub use recorder::VoiceRecorder;
pub use worker::{CaptureWorker, StopSignal};
