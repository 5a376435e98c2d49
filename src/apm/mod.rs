//! Acoustic processing (echo cancellation, noise suppression, gain control)
//!
//! The DSP itself lives behind [`AcousticProcessor`]. [`Apm`] is the shared
//! front: it serializes calls, validates every frame before the processor
//! sees it, and refuses work once disposed.

pub mod frame;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::frame::AudioFrame;
use crate::error::ApmError;
pub use frame::{validate, validate_parts, ValidFrame};

/// Acoustic processing engine operating on validated 10ms frames in place.
pub trait AcousticProcessor: Send {
    /// Near-end (microphone) audio
    fn process_stream(&mut self, frame: &mut ValidFrame<'_>) -> Result<(), ApmError>;

    /// Far-end audio as it is played by the speaker
    fn process_reverse_stream(&mut self, frame: &mut ValidFrame<'_>) -> Result<(), ApmError>;

    fn set_stream_delay_ms(&mut self, delay_ms: i32) -> Result<(), ApmError>;
}

/// Pass-through processor used when acoustic processing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProcessor;

impl AcousticProcessor for NullProcessor {
    fn process_stream(&mut self, _frame: &mut ValidFrame<'_>) -> Result<(), ApmError> {
        Ok(())
    }

    fn process_reverse_stream(&mut self, _frame: &mut ValidFrame<'_>) -> Result<(), ApmError> {
        Ok(())
    }

    fn set_stream_delay_ms(&mut self, _delay_ms: i32) -> Result<(), ApmError> {
        Ok(())
    }
}

/// APM statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct ApmStats {
    pub frames_processed: u64,
    pub reverse_frames_processed: u64,
    pub frames_rejected: u64,
}

/// Thread-safe, disposable wrapper around an [`AcousticProcessor`].
///
/// Capture and reverse streams run on different device threads; the processor
/// is not reentrant, so every call takes the same lock.
pub struct Apm {
    processor: Mutex<Option<Box<dyn AcousticProcessor>>>,
    frames_processed: AtomicU64,
    reverse_frames_processed: AtomicU64,
    frames_rejected: AtomicU64,
}

/// Shared handle to an APM instance
pub type SharedApm = Arc<Apm>;

impl Apm {
    pub fn new(processor: impl AcousticProcessor + 'static) -> Self {
        Self {
            processor: Mutex::new(Some(Box::new(processor))),
            frames_processed: AtomicU64::new(0),
            reverse_frames_processed: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
        }
    }

    /// An APM that validates frames but leaves them untouched
    pub fn passthrough() -> Self {
        Self::new(NullProcessor)
    }

    /// Process near-end audio in place.
    pub fn process_stream(&self, frame: &mut AudioFrame) -> Result<(), ApmError> {
        let mut guard = self.processor.lock();
        let processor = guard.as_mut().ok_or(ApmError::Disposed)?;
        let mut valid = self.check(frame)?;
        processor.process_stream(&mut valid)?;
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Feed far-end audio so the echo canceller knows what the speaker plays.
    pub fn process_reverse_stream(&self, frame: &mut AudioFrame) -> Result<(), ApmError> {
        let mut guard = self.processor.lock();
        let processor = guard.as_mut().ok_or(ApmError::Disposed)?;
        let mut valid = self.check(frame)?;
        processor.process_reverse_stream(&mut valid)?;
        self.reverse_frames_processed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_stream_delay_ms(&self, delay_ms: i32) -> Result<(), ApmError> {
        let mut guard = self.processor.lock();
        let processor = guard.as_mut().ok_or(ApmError::Disposed)?;
        processor.set_stream_delay_ms(delay_ms)
    }

    /// Release the processor; later calls fail with [`ApmError::Disposed`].
    pub fn dispose(&self) {
        if self.processor.lock().take().is_some() {
            tracing::debug!("APM disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.processor.lock().is_none()
    }

    pub fn stats(&self) -> ApmStats {
        ApmStats {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            reverse_frames_processed: self.reverse_frames_processed.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
        }
    }

    fn check<'a>(&self, frame: &'a mut AudioFrame) -> Result<ValidFrame<'a>, ApmError> {
        validate(frame).map_err(|e| {
            self.frames_rejected.fetch_add(1, Ordering::Relaxed);
            ApmError::InvalidFrame(e)
        })
    }
}

impl std::fmt::Debug for Apm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Apm")
            .field("disposed", &self.is_disposed())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Rough output latency estimate to feed [`Apm::set_stream_delay_ms`].
///
/// Twice the time it takes the device to play through all of its buffers.
pub fn estimate_stream_delay_ms(buffer_len: u32, num_buffers: u32, sample_rate: u32) -> i32 {
    if sample_rate == 0 {
        return 0;
    }
    let one_way = 1000 * u64::from(buffer_len) * u64::from(num_buffers) / u64::from(sample_rate);
    i32::try_from(2 * one_way).unwrap_or(i32::MAX)
}
