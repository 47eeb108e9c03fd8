use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info, warn};

use super::naming::SegmentNamer;
use super::worker::{CaptureWorker, StopSignal};
use crate::audio::{ActivityGate, FrameSource, FrameSourceProvider, SegmentSink};
use crate::error::{RecorderError, Result};
use crate::session::{RecorderConfig, SessionCounters, SessionState, SessionStats};

/// Name of the capture thread, visible in debuggers and `top -H`
const CAPTURE_THREAD_NAME: &str = "vad-capture";

/// What the capture thread hands back on exit: the source, unless the
/// worker never arrived
type WorkerHandle = JoinHandle<Option<Box<dyn FrameSource>>>;

/// Body run on the capture thread
type WorkerBody = Box<dyn FnOnce() -> Option<Box<dyn FrameSource>> + Send>;

/// Voice recorder controller
///
/// Owns the capture thread and the frame source for one session at a time.
/// Between a successful `start` and the next `stop` exactly one capture
/// thread is alive and exactly one source handle is held; `start` while
/// recording runs the full `stop` first.
pub struct VoiceRecorder {
    provider: Box<dyn FrameSourceProvider>,
    gate: Arc<dyn ActivityGate>,
    sink: Arc<dyn SegmentSink>,
    namer: SegmentNamer,
    state: SessionState,
    active: Option<ActiveSession>,
    finished: Option<FinishedSession>,
}

/// A running capture session
struct ActiveSession {
    id: String,
    started_at: DateTime<Utc>,
    signal: StopSignal,
    worker: WorkerHandle,
    counters: Arc<SessionCounters>,
}

/// The last session, kept for stats after `stop`
struct FinishedSession {
    id: String,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    counters: Arc<SessionCounters>,
}

impl VoiceRecorder {
    pub fn new(
        provider: Box<dyn FrameSourceProvider>,
        gate: Arc<dyn ActivityGate>,
        sink: Arc<dyn SegmentSink>,
    ) -> Self {
        Self {
            provider,
            gate,
            sink,
            namer: SegmentNamer::new(),
            state: SessionState::Idle,
            active: None,
            finished: None,
        }
    }

    /// Start a capture session
    ///
    /// Acquires a frame source for `config` and launches the capture worker.
    /// On failure the recorder stays `Idle` and no thread is spawned.
    pub fn start(&mut self, config: RecorderConfig) -> Result<()> {
        config.validate()?;

        if self.state == SessionState::Recording {
            info!("Recording already active; stopping it before restart");
            self.stop();
        }

        let source = self
            .provider
            .acquire(config.sample_rate, config.frame_size)
            .map_err(|e| {
                warn!("Frame source acquisition failed: {:#}", e);
                RecorderError::Acquisition(e)
            })?;

        let id = format!("session-{}", uuid::Uuid::new_v4());
        info!("Starting recording session: {} ({})", id, source.name());

        let signal = StopSignal::new();
        let counters = Arc::new(SessionCounters::new());
        let worker = CaptureWorker::new(
            source,
            Arc::clone(&self.gate),
            Arc::clone(&self.sink),
            config,
            signal.clone(),
            Arc::clone(&counters),
            self.namer.clone(),
        );

        let handle = spawn_capture(worker, |body| {
            std::thread::Builder::new()
                .name(CAPTURE_THREAD_NAME.to_string())
                .spawn(body)
        })?;

        self.active = Some(ActiveSession {
            id,
            started_at: Utc::now(),
            signal,
            worker: handle,
            counters,
        });
        self.state = SessionState::Recording;

        info!("Recording session started");
        Ok(())
    }

    /// Stop the current session
    ///
    /// Signals the worker, waits for it to leave its loop, then releases the
    /// frame source. A no-op when nothing is recording.
    pub fn stop(&mut self) {
        let Some(session) = self.active.take() else {
            return;
        };

        self.state = SessionState::Stopping;
        info!("Stopping recording session: {}", session.id);

        session.signal.stop();

        match session.worker.join() {
            Ok(Some(mut source)) => release_source(&mut *source),
            Ok(None) => {}
            Err(_) => {
                // The source was dropped without release() while the thread unwound
                error!("Capture thread panicked");
            }
        }

        self.finished = Some(FinishedSession {
            id: session.id,
            started_at: session.started_at,
            ended_at: Utc::now(),
            counters: session.counters,
        });
        self.state = SessionState::Idle;

        info!("Recording session stopped");
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Statistics for the running session, or the last one once stopped
    pub fn stats(&self) -> Option<SessionStats> {
        if let Some(session) = &self.active {
            return Some(session.counters.snapshot(
                &session.id,
                self.state,
                session.started_at,
                None,
            ));
        }

        self.finished.as_ref().map(|session| {
            session.counters.snapshot(
                &session.id,
                self.state,
                session.started_at,
                Some(session.ended_at),
            )
        })
    }
}

impl Drop for VoiceRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Launch `worker` through `spawn`
///
/// The worker is handed to the new thread only after it exists. If the
/// spawn fails the worker is still ours and its source is released here.
fn spawn_capture<F>(worker: CaptureWorker, spawn: F) -> Result<WorkerHandle>
where
    F: FnOnce(WorkerBody) -> std::io::Result<WorkerHandle>,
{
    let (handoff_tx, handoff_rx) = crossbeam_channel::bounded::<CaptureWorker>(1);
    let body: WorkerBody = Box::new(move || handoff_rx.recv().ok().map(CaptureWorker::run));

    match spawn(body) {
        Ok(handle) => {
            if let Err(unsent) = handoff_tx.send(worker) {
                // The thread is gone before receiving; release on its behalf
                release_source(&mut *unsent.into_inner().into_source());
            }
            Ok(handle)
        }
        Err(e) => {
            error!("Failed to spawn capture thread: {}", e);
            release_source(&mut *worker.into_source());
            Err(RecorderError::WorkerSpawn(e))
        }
    }
}

fn release_source(source: &mut dyn FrameSource) {
    if let Err(e) = source.release() {
        warn!("Failed to release {}: {:#}", source.name(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFrame, CancelToken};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TrackedSource {
        released: Arc<AtomicBool>,
    }

    impl FrameSource for TrackedSource {
        fn read(&mut self, _buf: &mut [i16], cancel: &CancelToken) -> anyhow::Result<usize> {
            cancel.wait_timeout(std::time::Duration::from_millis(5));
            Ok(0)
        }

        fn release(&mut self) -> anyhow::Result<()> {
            self.released.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "tracked"
        }
    }

    struct NullSink;

    impl SegmentSink for NullSink {
        fn write(&self, _: &str, _: &[AudioFrame], _: bool, _: u32) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn tracked_worker(signal: StopSignal) -> (CaptureWorker, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        let source = TrackedSource {
            released: Arc::clone(&released),
        };
        let worker = CaptureWorker::new(
            Box::new(source),
            Arc::new(|_: &AudioFrame| true),
            Arc::new(NullSink),
            RecorderConfig::default(),
            signal,
            Arc::new(SessionCounters::new()),
            SegmentNamer::new(),
        );
        (worker, released)
    }

    #[test]
    fn spawn_failure_releases_source() {
        let (worker, released) = tracked_worker(StopSignal::new());

        let result = spawn_capture(worker, |_body| {
            Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "thread limit reached"))
        });

        assert!(matches!(result, Err(RecorderError::WorkerSpawn(_))));
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn spawned_worker_returns_source() {
        let signal = StopSignal::new();
        let (worker, released) = tracked_worker(signal.clone());

        let handle = spawn_capture(worker, |body| std::thread::Builder::new().spawn(body))
            .expect("spawn succeeds");
        signal.stop();

        let source = handle.join().expect("worker exits cleanly");
        assert!(source.is_some(), "Source is handed back for release");
        assert!(!released.load(Ordering::SeqCst), "Release is left to stop()");
    }
}
