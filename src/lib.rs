pub mod audio;
pub mod config;
pub mod error;
pub mod recording;
pub mod session;

pub use audio::{
    ActivityGate, AudioFile, AudioFrame, CancelToken, EnergyGate, FileSegmentSink, FrameSource,
    FrameSourceProvider, MicrophoneProvider, Segment, SegmentFormat, SegmentSink,
    WavFileSourceProvider,
};
pub use config::Config;
pub use error::RecorderError;
pub use recording::VoiceRecorder;
pub use session::{RecorderConfig, SessionState, SessionStats};
