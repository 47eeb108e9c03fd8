pub mod file;
pub mod frame;
pub mod gate;
pub mod microphone;
pub mod segment;
pub mod sink;
pub mod source;
pub mod wav;

pub use file::{AudioFile, WavFileSourceProvider};
pub use frame::AudioFrame;
pub use gate::{rms_db, ActivityGate, EnergyGate};
pub use microphone::MicrophoneProvider;
pub use segment::Segment;
pub use sink::{FileSegmentSink, SegmentFormat, SegmentSink};
pub use source::{CancelToken, FrameSource, FrameSourceProvider};
pub use wav::{wav_header, WAV_HEADER_LEN};
