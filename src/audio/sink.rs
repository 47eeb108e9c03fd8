use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::frame::AudioFrame;
use super::wav::{wav_header, WAV_HEADER_LEN};
use crate::session::RecorderConfig;

/// On-disk layout of a persisted segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentFormat {
    /// Canonical 44-byte header followed by PCM samples
    Wav,
    /// Bare little-endian 16-bit samples
    #[default]
    Raw,
}

impl SegmentFormat {
    /// Whether the sink should prepend the WAV header
    pub fn encodes_header(self) -> bool {
        matches!(self, SegmentFormat::Wav)
    }

    /// File extension used in generated segment names
    pub fn extension(self) -> &'static str {
        match self {
            SegmentFormat::Wav => "wav",
            SegmentFormat::Raw => "pcm",
        }
    }
}

impl fmt::Display for SegmentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentFormat::Wav => f.write_str("wav"),
            SegmentFormat::Raw => f.write_str("raw"),
        }
    }
}

impl FromStr for SegmentFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(SegmentFormat::Wav),
            "raw" | "pcm" => Ok(SegmentFormat::Raw),
            other => Err(format!("unknown segment format '{other}' (expected wav or raw)")),
        }
    }
}

/// Durable storage for completed segments
///
/// Called synchronously from the capture thread at every flush. A slow
/// sink stalls capture for the duration of the write.
pub trait SegmentSink: Send + Sync {
    /// Persist `frames` (in order) under `name`, captured at `sample_rate`
    fn write(
        &self,
        name: &str,
        frames: &[AudioFrame],
        encode_header: bool,
        sample_rate: u32,
    ) -> Result<()>;
}

/// Writes each segment as its own file in an output directory
///
/// Data goes to a hidden `.partial` file first and is renamed into place
/// once complete, so a failed write never leaves a truncated segment.
#[derive(Debug, Clone)]
pub struct FileSegmentSink {
    output_dir: PathBuf,
}

impl FileSegmentSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();

        // Create output directory if it doesn't exist
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

        info!("Segment sink ready: {}", output_dir.display());

        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path a segment named `name` is written to
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    fn partial_path_for(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!(".{}.partial", name))
    }

    fn write_file(
        path: &Path,
        frames: &[AudioFrame],
        header: Option<[u8; WAV_HEADER_LEN]>,
    ) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create segment file: {:?}", path))?;
        let mut writer = BufWriter::new(file);

        if let Some(header) = header {
            writer
                .write_all(&header)
                .with_context(|| format!("Failed to write header: {:?}", path))?;
        }

        for frame in frames {
            for &sample in &frame.samples {
                writer
                    .write_all(&sample.to_le_bytes())
                    .with_context(|| format!("Failed to write samples: {:?}", path))?;
            }
        }

        writer
            .flush()
            .with_context(|| format!("Failed to flush segment file: {:?}", path))
    }
}

impl SegmentSink for FileSegmentSink {
    fn write(
        &self,
        name: &str,
        frames: &[AudioFrame],
        encode_header: bool,
        sample_rate: u32,
    ) -> Result<()> {
        let path = self.path_for(name);
        let partial = self.partial_path_for(name);

        let payload_bytes: usize = frames.iter().map(AudioFrame::byte_len).sum();
        let payload_bytes = u32::try_from(payload_bytes)
            .with_context(|| format!("Segment too large for a WAV header: {} bytes", payload_bytes))?;

        let header = encode_header.then(|| {
            wav_header(
                payload_bytes,
                sample_rate,
                RecorderConfig::CHANNELS,
                RecorderConfig::BITS_PER_SAMPLE,
            )
        });

        let result = Self::write_file(&partial, frames, header).and_then(|()| {
            fs::rename(&partial, &path)
                .with_context(|| format!("Failed to move segment into place: {:?}", path))
        });

        if let Err(e) = result {
            if partial.exists() {
                if let Err(remove_err) = fs::remove_file(&partial) {
                    warn!("Failed to remove partial segment {:?}: {}", partial, remove_err);
                }
            }
            return Err(e);
        }

        debug!(
            "Wrote segment {} ({} frames, {} bytes, {}Hz)",
            path.display(),
            frames.len(),
            payload_bytes,
            sample_rate
        );

        Ok(())
    }
}
