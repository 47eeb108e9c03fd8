use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::source::{CancelToken, FrameSource, FrameSourceProvider};

/// Poll interval while a replayed file has no more frames to give
const END_OF_FILE_POLL: Duration = Duration::from_millis(50);

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {:?}", path))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            bail!(
                "Unsupported WAV encoding in {:?}: expected 16-bit PCM, got {}-bit {:?}",
                path,
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            samples,
        })
    }
}

/// Replays a 16-bit mono WAV file as frames (for testing/batch processing)
#[derive(Debug, Clone)]
pub struct WavFileSourceProvider {
    path: PathBuf,
    realtime: bool,
}

impl WavFileSourceProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            realtime: false,
        }
    }

    /// Deliver frames no faster than they would arrive from a device
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

impl FrameSourceProvider for WavFileSourceProvider {
    fn acquire(&self, sample_rate: u32, frame_size: usize) -> Result<Box<dyn FrameSource>> {
        let audio = AudioFile::open(&self.path)?;

        if audio.channels != 1 {
            bail!(
                "{} has {} channels; only mono input is supported",
                audio.path,
                audio.channels
            );
        }

        if audio.sample_rate != sample_rate {
            bail!(
                "{} is {}Hz but the recorder is configured for {}Hz",
                audio.path,
                audio.sample_rate,
                sample_rate
            );
        }

        let frame_duration = Duration::from_secs_f64(frame_size as f64 / sample_rate as f64);

        Ok(Box::new(WavFileSource {
            name: format!("file:{}", audio.path),
            samples: audio.samples,
            position: 0,
            frame_duration,
            realtime: self.realtime,
            released: false,
        }))
    }
}

struct WavFileSource {
    name: String,
    samples: Vec<i16>,
    position: usize,
    frame_duration: Duration,
    realtime: bool,
    released: bool,
}

impl FrameSource for WavFileSource {
    fn read(&mut self, buf: &mut [i16], cancel: &CancelToken) -> Result<usize> {
        if self.released {
            bail!("{} has been released", self.name);
        }

        if self.position >= self.samples.len() {
            // Nothing left: behave like a silent device until cancelled
            cancel.wait_timeout(END_OF_FILE_POLL);
            return Ok(0);
        }

        if self.realtime && cancel.wait_timeout(self.frame_duration) {
            return Ok(0);
        }

        let end = (self.position + buf.len()).min(self.samples.len());
        let count = end - self.position;
        buf[..count].copy_from_slice(&self.samples[self.position..end]);
        self.position = end;

        if self.position == self.samples.len() {
            debug!("{}: end of file reached", self.name);
        }

        Ok(count)
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        self.samples = Vec::new();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
