use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use vad_recorder::audio::FrameSourceProvider;
use vad_recorder::recording::segment_timestamp;
use vad_recorder::{
    AudioFile, Config, EnergyGate, FileSegmentSink, MicrophoneProvider, SegmentFormat,
    VoiceRecorder, WavFileSourceProvider,
};

#[derive(Parser)]
#[command(name = "vad-recorder")]
#[command(about = "Record voiced microphone audio into length-bounded segments")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/vad-recorder")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record until Ctrl-C (or for a fixed duration)
    Record(RecordArgs),
    /// Print metadata of a WAV segment
    Inspect {
        /// Segment file
        file: PathBuf,
    },
    /// List input devices
    Devices,
}

#[derive(clap::Args)]
struct RecordArgs {
    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Replay a 16-bit mono WAV file instead of the microphone
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Pace file replay in real time
    #[arg(long)]
    realtime: bool,

    /// Input device name
    #[arg(long)]
    device: Option<String>,

    /// Output directory (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Segment format: wav or raw
    #[arg(short, long)]
    format: Option<SegmentFormat>,

    /// Energy gate threshold in dBFS
    #[arg(long)]
    threshold_db: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    match cli.command {
        Command::Record(args) => record(&cli.config, args).await,
        Command::Inspect { file } => inspect(&file),
        Command::Devices => {
            for name in MicrophoneProvider::list_devices()? {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

async fn record(config_path: &str, args: RecordArgs) -> Result<()> {
    let cfg = Config::load(config_path)?;

    let mut recorder_config = cfg.to_recorder_config();
    if let Some(format) = args.format {
        recorder_config.format = format;
    }

    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => cfg.output_dir()?,
    };
    let threshold_db = args.threshold_db.unwrap_or(cfg.gate.threshold_db);

    let sink = FileSegmentSink::new(&output_dir)?;
    let gate = EnergyGate::new(threshold_db);

    let provider: Box<dyn FrameSourceProvider> = match args.input {
        Some(path) => Box::new(WavFileSourceProvider::new(path).realtime(args.realtime)),
        None => {
            let mut mic = MicrophoneProvider::new();
            if let Some(name) = args.device.or_else(|| cfg.device.name.clone()) {
                mic = mic.with_device(name);
            }
            Box::new(mic)
        }
    };

    info!("vad-recorder v{}", env!("CARGO_PKG_VERSION"));
    info!("Output directory: {}", output_dir.display());
    info!(
        "Segments: {}s max, {} format, gate threshold {:.1} dBFS",
        recorder_config.max_segment_duration_secs, recorder_config.format, threshold_db
    );

    let mut recorder = VoiceRecorder::new(provider, Arc::new(gate), Arc::new(sink));
    recorder.start(recorder_config)?;

    match args.duration {
        Some(secs) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for Ctrl-C")?;
                    info!("Interrupted");
                }
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!("Recording duration elapsed");
                }
            }
        }
        None => {
            info!("Press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    // stop() joins the capture thread
    let stats = tokio::task::spawn_blocking(move || {
        recorder.stop();
        recorder.stats()
    })
    .await
    .context("Stop task panicked")?;

    if let Some(stats) = stats {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let audio = AudioFile::open(path)?;

    println!("Path: {}", audio.path);
    println!("Duration: {:.2}s", audio.duration_seconds);
    println!("Sample rate: {}Hz", audio.sample_rate);
    println!("Channels: {}", audio.channels);
    println!("Bits per sample: {}", audio.bits_per_sample);
    println!("Samples: {}", audio.samples.len());

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if let Some(captured_at) =
        segment_timestamp(name).and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
    {
        println!("Captured at: {}", captured_at.to_rfc3339());
    }

    Ok(())
}
