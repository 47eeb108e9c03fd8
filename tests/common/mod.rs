// Test doubles shared by the integration tests
//
// ScriptedProvider hands out sources that replay a shared script of reads
// and then block (cancellably) like an idle device. SourceTracker counts
// live handles so tests can assert the single-session invariant.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use vad_recorder::audio::{AudioFrame, CancelToken, FrameSource, FrameSourceProvider, SegmentSink};

/// One scripted read result
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver these samples
    Frame(Vec<i16>),
    /// Return Ok(0)
    Empty,
    /// Return an error
    Fail,
}

/// A frame of `len` samples all equal to `value`
pub fn frame(value: i16, len: usize) -> Step {
    Step::Frame(vec![value; len])
}

#[derive(Debug, Default)]
pub struct SourceTracker {
    acquired: AtomicUsize,
    released: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    reads: AtomicUsize,
    blocked: AtomicUsize,
}

impl SourceTracker {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of reads that found the script empty and blocked
    pub fn blocked(&self) -> usize {
        self.blocked.load(Ordering::SeqCst)
    }
}

pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Step>>>,
    tracker: Arc<SourceTracker>,
    fail_acquire: bool,
}

impl ScriptedProvider {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            tracker: Arc::new(SourceTracker::default()),
            fail_acquire: false,
        }
    }

    /// A provider whose sources never produce a frame
    pub fn idle() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            fail_acquire: true,
            ..Self::idle()
        }
    }

    /// Handle for appending steps, read by whichever source is live next
    pub fn script_handle(&self) -> ScriptHandle {
        ScriptHandle(Arc::clone(&self.script))
    }

    pub fn tracker(&self) -> Arc<SourceTracker> {
        Arc::clone(&self.tracker)
    }
}

/// Lets a test extend the script after the provider has moved into a recorder
#[derive(Clone)]
pub struct ScriptHandle(Arc<Mutex<VecDeque<Step>>>);

impl ScriptHandle {
    pub fn push(&self, steps: impl IntoIterator<Item = Step>) {
        self.0.lock().unwrap().extend(steps);
    }
}

impl FrameSourceProvider for ScriptedProvider {
    fn acquire(&self, _sample_rate: u32, _frame_size: usize) -> Result<Box<dyn FrameSource>> {
        if self.fail_acquire {
            bail!("scripted device unavailable");
        }

        self.tracker.acquired.fetch_add(1, Ordering::SeqCst);
        let live = self.tracker.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(ScriptedSource {
            script: Arc::clone(&self.script),
            tracker: Arc::clone(&self.tracker),
            released: false,
        }))
    }
}

struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Step>>>,
    tracker: Arc<SourceTracker>,
    released: bool,
}

impl FrameSource for ScriptedSource {
    fn read(&mut self, buf: &mut [i16], cancel: &CancelToken) -> Result<usize> {
        if self.released {
            bail!("read after release");
        }

        self.tracker.reads.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();

        match step {
            Some(Step::Frame(samples)) => {
                let count = samples.len().min(buf.len());
                buf[..count].copy_from_slice(&samples[..count]);
                Ok(count)
            }
            Some(Step::Empty) => Ok(0),
            Some(Step::Fail) => Err(anyhow!("scripted read failure")),
            None => {
                self.tracker.blocked.fetch_add(1, Ordering::SeqCst);
                cancel.wait_timeout(Duration::from_secs(30));
                Ok(0)
            }
        }
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            self.tracker.released.fetch_add(1, Ordering::SeqCst);
            self.tracker.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[derive(Debug, Clone)]
pub struct WrittenSegment {
    pub name: String,
    pub frames: Vec<AudioFrame>,
    pub encode_header: bool,
    pub sample_rate: u32,
}

impl WrittenSegment {
    pub fn sample_count(&self) -> usize {
        self.frames.iter().map(AudioFrame::len).sum()
    }

    pub fn samples(&self) -> Vec<i16> {
        self.frames.iter().flat_map(|f| f.samples.iter().copied()).collect()
    }
}

/// Keeps every written segment in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    segments: Mutex<Vec<WrittenSegment>>,
    failures_left: AtomicUsize,
    panic_next: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` writes with an I/O-style error
    pub fn failing_first(count: usize) -> Self {
        let sink = Self::default();
        sink.failures_left.store(count, Ordering::SeqCst);
        sink
    }

    /// Panic inside the next write
    pub fn panicking_once() -> Self {
        let sink = Self::default();
        sink.panic_next.store(true, Ordering::SeqCst);
        sink
    }

    pub fn segments(&self) -> Vec<WrittenSegment> {
        self.segments.lock().unwrap().clone()
    }
}

impl SegmentSink for RecordingSink {
    fn write(
        &self,
        name: &str,
        frames: &[AudioFrame],
        encode_header: bool,
        sample_rate: u32,
    ) -> Result<()> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("sink exploded");
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            bail!("No space left on device");
        }

        self.segments.lock().unwrap().push(WrittenSegment {
            name: name.to_string(),
            frames: frames.to_vec(),
            encode_header,
            sample_rate,
        });
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub const WAIT: Duration = Duration::from_secs(5);
