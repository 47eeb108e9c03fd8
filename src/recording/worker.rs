use anyhow::anyhow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

use super::naming::SegmentNamer;
use crate::audio::{ActivityGate, AudioFrame, CancelToken, FrameSource, Segment, SegmentSink};
use crate::session::{RecorderConfig, SessionCounters};

/// Nice value requested for the capture thread (Android's THREAD_PRIORITY_AUDIO)
#[cfg(any(target_os = "linux", target_os = "android"))]
const CAPTURE_THREAD_NICE: libc::c_int = -16;

/// Stop signal shared by the controller and one capture worker
///
/// The controller is the only writer. The worker checks both halves at the
/// top of every iteration; the token additionally wakes a blocked read.
#[derive(Debug, Clone)]
pub struct StopSignal {
    running: Arc<AtomicBool>,
    cancel: CancelToken,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            cancel: CancelToken::new(),
        }
    }

    /// Clear the running flag and cancel any blocking read
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    pub fn should_continue(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancelToken {
        &self.cancel
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking read loop for one capture session
///
/// Pipeline per iteration: source read → gate → segment → flush on threshold.
/// The segment lives on this thread only; nothing else touches it.
pub struct CaptureWorker {
    source: Box<dyn FrameSource>,
    gate: Arc<dyn ActivityGate>,
    sink: Arc<dyn SegmentSink>,
    config: RecorderConfig,
    signal: StopSignal,
    counters: Arc<SessionCounters>,
    segment: Segment,
    namer: SegmentNamer,
}

impl CaptureWorker {
    pub fn new(
        source: Box<dyn FrameSource>,
        gate: Arc<dyn ActivityGate>,
        sink: Arc<dyn SegmentSink>,
        config: RecorderConfig,
        signal: StopSignal,
        counters: Arc<SessionCounters>,
        namer: SegmentNamer,
    ) -> Self {
        Self {
            source,
            gate,
            sink,
            config,
            signal,
            counters,
            segment: Segment::new(),
            namer,
        }
    }

    /// Run until stopped, then hand the frame source back for release
    pub fn run(mut self) -> Box<dyn FrameSource> {
        promote_capture_thread();

        info!(
            "Capture loop started: {} ({}Hz, {} samples/frame, flush every {} samples)",
            self.source.name(),
            self.config.sample_rate,
            self.config.frame_size,
            self.config.flush_threshold()
        );

        let mut buf = vec![0i16; self.config.frame_size];

        while self.signal.should_continue() {
            let count = match self.source.read(&mut buf, self.signal.token()) {
                Ok(count) => count.min(buf.len()),
                Err(e) => {
                    trace!("Frame read failed: {:#}", e);
                    0
                }
            };

            // A read that completes after stop() must not reach the gate or sink
            if !self.signal.should_continue() {
                break;
            }

            if count == 0 {
                self.counters.record_read_failure();
                continue;
            }

            self.counters.record_read();
            self.on_frame(AudioFrame::new(buf[..count].to_vec()));
        }

        let tail = self.segment.clear();
        if tail > 0 {
            info!("Discarded {} unflushed samples at stop", tail);
            self.counters.record_tail_discarded(tail);
        }

        info!(
            "Capture loop stopped: {} ({} segments flushed, {} failed)",
            self.source.name(),
            self.counters.segments_flushed(),
            self.counters.segments_failed()
        );

        self.source
    }

    /// Give up on running and hand the unused frame source back
    pub fn into_source(self) -> Box<dyn FrameSource> {
        self.source
    }

    fn on_frame(&mut self, frame: AudioFrame) {
        if !self.gate.decide(&frame) {
            self.counters.record_discarded();
            return;
        }

        self.counters.record_voiced();
        self.segment.push(frame);

        if self.segment.is_full(self.config.flush_threshold()) {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let name = self.namer.next_name(self.config.format.extension());
        let frames = self.segment.take();
        let samples: usize = frames.iter().map(AudioFrame::len).sum();
        let encode_header = self.config.format.encodes_header();
        let sample_rate = self.config.sample_rate;

        let sink = &self.sink;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            sink.write(&name, &frames, encode_header, sample_rate)
        }))
        .unwrap_or_else(|payload| {
            Err(anyhow!("segment sink panicked: {}", panic_message(&*payload)))
        });

        match result {
            Ok(()) => {
                debug!(
                    "Flushed segment {} ({} frames, {} samples)",
                    name,
                    frames.len(),
                    samples
                );
                self.counters.record_flush(samples);
            }
            Err(e) => {
                error!("Failed to write segment {}: {:#}", name, e);
                self.counters.record_flush_failure(&e);
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Ask the OS to schedule the calling thread ahead of normal work
#[cfg(any(target_os = "linux", target_os = "android"))]
fn promote_capture_thread() {
    // who = 0 targets the calling thread on Linux
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, CAPTURE_THREAD_NICE) };
    if rc != 0 {
        debug!(
            "Could not raise capture thread priority: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn promote_capture_thread() {
    debug!("Capture thread priority left at default on this platform");
}
