// Microphone frame source backed by cpal
//
// The cpal stream is owned by a dedicated device thread for its whole life,
// so the handle given to the capture worker only holds channel ends. The
// data callback pushes sample blocks into a bounded channel; when the
// capture thread falls behind (e.g. during a slow flush) blocks are dropped
// at the source instead of buffering without bound.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::source::{CancelToken, FrameSource, FrameSourceProvider};

/// Longest a read waits on the device before re-checking cancellation
const READ_POLL: Duration = Duration::from_millis(20);

/// Callback blocks buffered between the device and the capture thread
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Acquires the system microphone (default or named input device)
#[derive(Debug, Clone, Default)]
pub struct MicrophoneProvider {
    device_name: Option<String>,
    channel_capacity: Option<usize>,
}

impl MicrophoneProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific input device instead of the host default
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity.max(1));
        self
    }

    /// List input device names
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("No input audio devices available")?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

impl FrameSourceProvider for MicrophoneProvider {
    fn acquire(&self, sample_rate: u32, frame_size: usize) -> Result<Box<dyn FrameSource>> {
        let capacity = self.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        let (sample_tx, sample_rx) = bounded::<Vec<i16>>(capacity);
        let (ready_tx, ready_rx) = bounded::<Result<String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let dropped = Arc::new(AtomicUsize::new(0));

        let device_name = self.device_name.clone();
        let dropped_callback = Arc::clone(&dropped);

        let device_thread = std::thread::Builder::new()
            .name("vad-mic".to_string())
            .spawn(move || {
                run_device(
                    device_name,
                    sample_rate,
                    sample_tx,
                    dropped_callback,
                    ready_tx,
                    shutdown_rx,
                )
            })
            .context("Failed to spawn microphone thread")?;

        let name = match ready_rx.recv() {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                let _ = device_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = device_thread.join();
                bail!("Microphone thread exited before reporting readiness");
            }
        };

        info!(
            "Microphone acquired: {} ({}Hz, {} samples/frame)",
            name, sample_rate, frame_size
        );

        Ok(Box::new(MicrophoneSource {
            name,
            samples_rx: sample_rx,
            pending: VecDeque::with_capacity(frame_size * 2),
            shutdown_tx: Some(shutdown_tx),
            device_thread: Some(device_thread),
            dropped,
        }))
    }
}

fn run_device(
    device_name: Option<String>,
    sample_rate: u32,
    sample_tx: Sender<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
    ready_tx: Sender<Result<String>>,
    shutdown_rx: Receiver<()>,
) {
    match open_stream(device_name.as_deref(), sample_rate, sample_tx, dropped) {
        Ok((stream, name)) => {
            if ready_tx.send(Ok(name)).is_err() {
                return;
            }
            // Block until release() signals or drops the sender
            let _ = shutdown_rx.recv();
            if let Err(e) = stream.pause() {
                debug!("Failed to pause input stream: {}", e);
            }
            drop(stream);
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
        }
    }
}

fn open_stream(
    device_name: Option<&str>,
    sample_rate: u32,
    sample_tx: Sender<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
) -> Result<(cpal::Stream, String)> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => {
            let mut devices = host.input_devices().context("No input audio devices available")?;
            devices
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| anyhow!("Input device '{}' not found", name))?
        }
        None => host
            .default_input_device()
            .context("No input audio device available")?,
    };
    let name = device.name().unwrap_or_else(|_| "unknown input device".to_string());

    let config = StreamConfig {
        channels: 1,
        sample_rate: SampleRate(sample_rate),
        buffer_size: BufferSize::Default,
    };

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[i16], _info: &cpal::InputCallbackInfo| {
                if sample_tx.try_send(data.to_vec()).is_err() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
            move |err| {
                warn!("Audio stream error: {}", err);
            },
            None,
        )
        .with_context(|| format!("Failed to open '{}' as {}Hz mono i16", name, sample_rate))?;

    stream.play().context("Failed to start audio stream")?;

    Ok((stream, name))
}

struct MicrophoneSource {
    name: String,
    samples_rx: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    shutdown_tx: Option<Sender<()>>,
    device_thread: Option<JoinHandle<()>>,
    dropped: Arc<AtomicUsize>,
}

impl FrameSource for MicrophoneSource {
    fn read(&mut self, buf: &mut [i16], cancel: &CancelToken) -> Result<usize> {
        if self.shutdown_tx.is_none() {
            bail!("{} has been released", self.name);
        }

        while self.pending.len() < buf.len() {
            if cancel.is_cancelled() {
                return Ok(0);
            }

            match self.samples_rx.recv_timeout(READ_POLL) {
                Ok(block) => self.pending.extend(block),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    // Don't let the capture loop spin on a dead stream
                    cancel.wait_timeout(READ_POLL);
                    bail!("{}: audio stream disconnected", self.name);
                }
            }
        }

        let count = buf.len();
        for (slot, sample) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *slot = sample;
        }

        Ok(count)
    }

    fn release(&mut self) -> Result<()> {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return Ok(());
        };
        drop(shutdown_tx);

        if let Some(handle) = self.device_thread.take() {
            handle
                .join()
                .map_err(|_| anyhow!("Microphone thread panicked"))?;
        }

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!("{}: {} audio blocks dropped at the source", self.name, dropped);
        }

        info!("Microphone released: {}", self.name);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release microphone on drop: {}", e);
        }
    }
}
