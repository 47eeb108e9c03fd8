use super::frame::AudioFrame;

/// Voice-activity decision applied to every frame read by the capture worker
///
/// Called synchronously on the capture thread, once per successful read,
/// so it has to be cheap and free of side effects the pipeline relies on.
pub trait ActivityGate: Send + Sync {
    /// Returns `true` if the frame should be kept as voice
    fn decide(&self, frame: &AudioFrame) -> bool;
}

impl<F> ActivityGate for F
where
    F: Fn(&AudioFrame) -> bool + Send + Sync,
{
    fn decide(&self, frame: &AudioFrame) -> bool {
        self(frame)
    }
}

const SILENCE_FLOOR_DB: f32 = -96.0;

/// Level gate: a frame is voice when its RMS level reaches a dBFS threshold
#[derive(Debug, Clone, Copy)]
pub struct EnergyGate {
    threshold_db: f32,
}

impl EnergyGate {
    pub const DEFAULT_THRESHOLD_DB: f32 = -45.0;

    pub fn new(threshold_db: f32) -> Self {
        Self { threshold_db }
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }
}

impl Default for EnergyGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD_DB)
    }
}

impl ActivityGate for EnergyGate {
    fn decide(&self, frame: &AudioFrame) -> bool {
        rms_db(&frame.samples) >= self.threshold_db
    }
}

/// RMS level of 16-bit samples in dBFS (full scale = 0 dB)
pub fn rms_db(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return SILENCE_FLOOR_DB;
    }

    let energy: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / 32_768.0;
            normalized * normalized
        })
        .sum::<f64>()
        / samples.len() as f64;

    let rms = energy.sqrt().max(1e-5);
    (20.0 * rms.log10()) as f32
}
