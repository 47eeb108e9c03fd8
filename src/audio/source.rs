use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Cancellation signal shared between the controller and a blocking read
///
/// Reads that wait on a device or a timer take the token and return as soon
/// as it is cancelled, so `stop()` never waits on a future frame.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wakeup: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token and wake every thread blocked in [`CancelToken::wait_timeout`]
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.wakeup.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for up to `timeout`, returning early if the token is cancelled
    ///
    /// Returns `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            return true;
        }

        let _wait = self
            .inner
            .wakeup
            .wait_timeout_while(guard, timeout, |_| !self.is_cancelled())
            .unwrap_or_else(PoisonError::into_inner);

        self.is_cancelled()
    }
}

/// An acquired audio input handle
///
/// Yields fixed-size blocks of signed 16-bit mono samples at the rate it was
/// acquired with. Implementations:
/// - Microphone: cpal input stream (see `audio::microphone`)
/// - File: replay of a WAV file (for testing/batch processing)
pub trait FrameSource: Send {
    /// Block until one frame is available and copy it into `buf`
    ///
    /// Returns the number of samples written. `Ok(0)` means no frame this
    /// cycle; implementations must return it promptly once `cancel` fires.
    fn read(&mut self, buf: &mut [i16], cancel: &CancelToken) -> Result<usize>;

    /// Release the underlying device. Calling it more than once is a no-op.
    fn release(&mut self) -> Result<()>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Acquires frame sources configured for a sample rate and frame size
pub trait FrameSourceProvider: Send {
    fn acquire(&self, sample_rate: u32, frame_size: usize) -> Result<Box<dyn FrameSource>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_wait_timeout_elapses_without_cancel() {
        let token = CancelToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let started = Instant::now();
        let handle = std::thread::spawn(move || waiter.wait_timeout(Duration::from_secs(10)));

        std::thread::sleep(Duration::from_millis(20));
        token.cancel();

        assert!(handle.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_after_cancel_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.wait_timeout(Duration::from_secs(10)));
    }
}
