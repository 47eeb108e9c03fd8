use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::{EnergyGate, SegmentFormat};
use crate::session::RecorderConfig;

/// Prefix for environment overrides, e.g. `VAD_RECORDER_STORAGE__OUTPUT_DIR`
const ENV_PREFIX: &str = "VAD_RECORDER";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderSection,
    pub storage: StorageConfig,
    pub gate: GateConfig,
    pub device: DeviceConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecorderSection {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub max_segment_duration_secs: u32,
    pub format: SegmentFormat,
}

impl Default for RecorderSection {
    fn default() -> Self {
        let defaults = RecorderConfig::default();
        Self {
            sample_rate: defaults.sample_rate,
            frame_size: defaults.frame_size,
            max_segment_duration_secs: defaults.max_segment_duration_secs,
            format: defaults.format,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: "~/.vad-recorder/segments".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub threshold_db: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold_db: EnergyGate::DEFAULT_THRESHOLD_DB,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Input device name; the host default when unset
    pub name: Option<String>,
}

impl Config {
    /// Load settings from `path` (any format the `config` crate knows, file
    /// optional) layered under `VAD_RECORDER_*` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load config: {}", path))?;

        settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", path))
    }

    pub fn to_recorder_config(&self) -> RecorderConfig {
        RecorderConfig::new(
            self.recorder.sample_rate,
            self.recorder.frame_size,
            self.recorder.max_segment_duration_secs,
        )
        .with_format(self.recorder.format)
    }

    /// Output directory with `~` and environment variables expanded
    pub fn output_dir(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.storage.output_dir)
            .with_context(|| format!("Failed to expand output_dir: {}", self.storage.output_dir))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}
