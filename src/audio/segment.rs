use super::frame::AudioFrame;

/// In-memory run of gate-accepted frames destined for one output unit
///
/// Owned and mutated by the capture thread only. The sample total is kept
/// alongside the frames so threshold checks never rescan them.
#[derive(Debug, Default)]
pub struct Segment {
    frames: Vec<AudioFrame>,
    total_samples: usize,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame in capture order
    pub fn push(&mut self, frame: AudioFrame) {
        self.total_samples += frame.len();
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[AudioFrame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether the accumulated samples have reached `threshold`
    pub fn is_full(&self, threshold: usize) -> bool {
        self.total_samples >= threshold
    }

    /// Hand out the accumulated frames and reset to empty
    pub fn take(&mut self) -> Vec<AudioFrame> {
        self.total_samples = 0;
        std::mem::take(&mut self.frames)
    }

    /// Drop the accumulated frames, returning how many samples were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.total_samples;
        self.frames.clear();
        self.total_samples = 0;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_tracks_sample_total() {
        let mut segment = Segment::new();
        segment.push(AudioFrame::new(vec![1; 160]));
        segment.push(AudioFrame::new(vec![2; 100]));

        assert_eq!(segment.frame_count(), 2);
        assert_eq!(segment.total_samples(), 260);
        assert!(segment.is_full(260));
        assert!(!segment.is_full(261));
    }

    #[test]
    fn test_take_preserves_order_and_resets() {
        let mut segment = Segment::new();
        for i in 0..3 {
            segment.push(AudioFrame::new(vec![i; 4]));
        }

        let frames = segment.take();
        let firsts: Vec<i16> = frames.iter().map(|f| f.samples[0]).collect();
        assert_eq!(firsts, vec![0, 1, 2]);

        assert!(segment.is_empty());
        assert_eq!(segment.total_samples(), 0);
        assert!(segment.take().is_empty());
    }

    #[test]
    fn test_clear_reports_discarded_samples() {
        let mut segment = Segment::new();
        segment.push(AudioFrame::new(vec![0; 512]));

        assert_eq!(segment.clear(), 512);
        assert_eq!(segment.clear(), 0);
    }
}
