//! # RTC Audio Pipeline
//!
//! Moves live audio between audio devices and a real-time transport that only
//! accepts exact 10ms frames, without ever blocking the device callback.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────── CAPTURE ─────────────────────────────────┐
//! │                                                                          │
//! │  Microphone ──▶ cpal input thread (audio::capture)                       │
//! │                      │  f32 block, any size                              │
//! │                      ▼                                                   │
//! │        MicrophoneSource (pipeline::capture)                              │
//! │         PCM encode ─▶ SampleAccumulator<ByteRingBuffer> ─▶ 10ms frames   │
//! │                                                   │                      │
//! │                      remix to 48 kHz (resample) ◀─┘                      │
//! │                                │                                         │
//! │                  validate (apm::frame) ─▶ Apm ─▶ FrameSink ─▶ transport  │
//! │                                           ▲                              │
//! │  Far-end mix ──▶ ApmReverseStream ────────┘ (reverse stream)             │
//! └──────────────────────────────────────────────────────────────────────────┘
//!
//! ┌──────────────────────────────── PLAYBACK ────────────────────────────────┐
//! │                                                                          │
//! │  transport ──▶ PlaybackStreams::deliver (pipeline::registry)             │
//! │                      │  frames at the sender's format                    │
//! │                      ▼                                                   │
//! │        ResampleWorker (pipeline::worker): one thread, bounded queue      │
//! │         remix to sink format ─▶ StreamBuffer (one mutex per stream)      │
//! │                                        │  SampleAccumulator<TypedRing>   │
//! │                                        ▼                                 │
//! │        PlaybackStream ◀── cpal output thread (audio::playback)           │
//! │         exact callback-sized read ─▶ f32 ─▶ Speakers                     │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod apm;
pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod resample;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Sample rate acoustic processing and the transport run at
    pub const APM_SAMPLE_RATE: u32 = 48000;

    /// Duration of every frame handed to the APM and the transport
    pub const FRAME_DURATION_MS: u32 = 10;

    /// Audio held by an accumulator before overflow handling kicks in
    pub const DEFAULT_BUFFER_DURATION_MS: u32 = 200;

    /// Default transport channel count (stereo)
    pub const DEFAULT_CHANNELS: u32 = 2;

    /// Resample worker queue capacity (in frames)
    pub const WORKER_QUEUE_CAPACITY: usize = 256;

    /// Bytes per 16-bit PCM sample
    pub const BYTES_PER_SAMPLE: usize = 2;
}
