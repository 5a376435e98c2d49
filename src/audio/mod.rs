//! Audio subsystem module
//!
//! Storage primitives (rings, accumulator, guarded buffer), the frame and
//! format types they carry, and the cpal device glue that drives them.

pub mod buffer;
pub mod capture;
pub mod device;
pub mod format;
pub mod frame;
pub mod guarded;
pub mod playback;
pub mod ring_buffer;
pub mod typed_ring;

pub use buffer::{AccumulatorStats, CaptureAccumulator, PlaybackAccumulator, SampleAccumulator, SampleStore};
pub use capture::AudioCapture;
pub use format::AudioFormat;
pub use frame::AudioFrame;
pub use guarded::{MutexGuardedBuffer, SharedBuffer};
pub use playback::AudioPlayback;
pub use ring_buffer::ByteRingBuffer;
pub use typed_ring::TypedRingBuffer;

/// Receives blocks captured by an input device.
///
/// Runs on the device's real-time thread: implementations must not block
/// beyond a short mutex hold.
pub trait InputCallback: Send {
    fn on_audio(&mut self, data: &[f32], channels: u32, sample_rate: u32);
}

/// Fills blocks for an output device.
///
/// Runs on the device's real-time thread; whatever is left in `data` is
/// played, so implementations write silence when they have nothing.
pub trait OutputCallback: Send {
    fn on_audio(&mut self, data: &mut [f32], channels: u32, sample_rate: u32);
}
