//! Frame pipeline between device callbacks and the transport
//!
//! * [`capture`]: microphone and far-end taps, 10ms frames out
//! * [`worker`]: shared background resampler for remote streams
//! * [`stream`] / [`registry`]: per-stream playback buffers and their readers

pub mod capture;
pub mod registry;
pub mod stream;
pub mod worker;

pub use capture::{ApmReverseStream, CaptureCounters, CaptureStats, FrameSink, MicrophoneSource};
pub use registry::PlaybackStreams;
pub use stream::{PlaybackStream, StreamBuffer};
pub use worker::{ResampleWorker, StreamId, WorkerStats};
