//! Capture path: device blocks in, validated 10ms transport frames out
//!
//! ```text
//! input callback ──▶ PCM encode ──▶ accumulator ──▶ 10ms frames
//!                                                     │
//!                       remix to 48 kHz if needed ◀───┘
//!                                │
//!                      validate ──▶ APM ──▶ FrameSink (transport)
//! ```
//!
//! [`ApmReverseStream`] runs the same drain over the far-end mix so the echo
//! canceller can see what the speakers play; its frames go nowhere else.

use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::apm::SharedApm;
use crate::audio::buffer::CaptureAccumulator;
use crate::audio::format::AudioFormat;
use crate::audio::frame::AudioFrame;
use crate::audio::InputCallback;
use crate::constants::{DEFAULT_BUFFER_DURATION_MS, FRAME_DURATION_MS};
use crate::error::ApmError;
use crate::resample::{transport_format, Remixer};

/// Where finished capture frames go.
pub trait FrameSink: Send {
    /// Deliver a frame without blocking; `false` if it was dropped.
    fn push_frame(&mut self, frame: AudioFrame) -> bool;
}

impl FrameSink for Sender<AudioFrame> {
    fn push_frame(&mut self, frame: AudioFrame) -> bool {
        match self.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Capture path counters, readable while the source runs on the device thread
#[derive(Debug, Default)]
pub struct CaptureCounters {
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    frames_invalid: AtomicU64,
    apm_errors: AtomicU64,
}

/// Capture statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames accepted by the sink
    pub frames_sent: u64,
    /// Frames the sink refused (full or closed)
    pub frames_dropped: u64,
    /// Frames that failed validation
    pub frames_invalid: u64,
    /// Processor errors (frame still forwarded)
    pub apm_errors: u64,
}

impl CaptureCounters {
    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_invalid: self.frames_invalid.load(Ordering::Relaxed),
            apm_errors: self.apm_errors.load(Ordering::Relaxed),
        }
    }
}

/// Drains 10ms frames out of an accumulator and brings them to 48 kHz.
///
/// At rates not divisible by 100 a 10ms read is not a whole number of
/// samples, so reads alternate between the neighbouring lengths and the
/// remainder is carried to the next frame.
struct FrameDrain {
    accumulator: CaptureAccumulator,
    remixer: Arc<dyn Remixer>,
    /// Format `carry` was accumulated for
    cadence: AudioFormat,
    /// Thousandths of a sample owed to the next read
    carry: u64,
}

impl FrameDrain {
    fn new(buffer_duration_ms: u32, remixer: Arc<dyn Remixer>) -> Self {
        Self {
            accumulator: CaptureAccumulator::new(buffer_duration_ms),
            remixer,
            cadence: AudioFormat::UNCONFIGURED,
            carry: 0,
        }
    }

    /// Next 10ms frame converted to `target`, or `None` when drained.
    ///
    /// Converted frames always hold the target's full 10ms. A frame the
    /// remixer cannot convert is passed through unchanged so that validation
    /// reports why it is unusable.
    fn next_frame(&mut self, target: impl Fn(AudioFormat) -> AudioFormat) -> Option<AudioFrame> {
        let format = self.accumulator.format();
        if !format.is_configured() {
            return None;
        }
        if format != self.cadence {
            self.cadence = format;
            self.carry = 0;
        }

        let owed = u64::from(format.sample_rate) * u64::from(FRAME_DURATION_MS) + self.carry;
        let raw = self.accumulator.read(format, (owed / 1000) as u32)?;
        self.carry = owed % 1000;

        let target = target(format);
        if format == target {
            return Some(raw);
        }
        let frame_len = target.samples_per_channel(FRAME_DURATION_MS);
        match self.remixer.remix_and_resample_exact(&raw, target, frame_len) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("Capture remix {} -> {} failed: {}", format, target, e);
                Some(raw)
            }
        }
    }
}

/// Microphone input callback feeding the transport.
pub struct MicrophoneSource<S: FrameSink> {
    drain: FrameDrain,
    apm: SharedApm,
    sink: S,
    transport_channels: u32,
    counters: Arc<CaptureCounters>,
}

impl<S: FrameSink> MicrophoneSource<S> {
    pub fn new(apm: SharedApm, remixer: Arc<dyn Remixer>, sink: S, transport_channels: u32) -> Self {
        Self::with_buffer_duration(apm, remixer, sink, transport_channels, DEFAULT_BUFFER_DURATION_MS)
    }

    pub fn with_buffer_duration(
        apm: SharedApm,
        remixer: Arc<dyn Remixer>,
        sink: S,
        transport_channels: u32,
        buffer_duration_ms: u32,
    ) -> Self {
        Self {
            drain: FrameDrain::new(buffer_duration_ms, remixer),
            apm,
            sink,
            transport_channels,
            counters: Arc::new(CaptureCounters::default()),
        }
    }

    /// Shared counters; keep a clone before handing the source to a device
    pub fn counters(&self) -> Arc<CaptureCounters> {
        self.counters.clone()
    }

    /// Accept one device block and forward every complete 10ms frame.
    pub fn write_audio(&mut self, data: &[f32], channels: u32, sample_rate: u32) {
        self.drain
            .accumulator
            .write_f32(data, AudioFormat::new(channels, sample_rate));

        let channels = self.transport_channels;
        while let Some(mut frame) = self.drain.next_frame(|_| transport_format(channels)) {
            match self.apm.process_stream(&mut frame) {
                Ok(()) => {}
                Err(ApmError::InvalidFrame(e)) => {
                    self.counters.frames_invalid.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Error during creation of APM frame: {}", e);
                    break;
                }
                Err(e) => {
                    self.counters.apm_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Error during processing stream: {}", e);
                }
            }

            if self.sink.push_frame(frame) {
                self.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
            } else {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl<S: FrameSink> InputCallback for MicrophoneSource<S> {
    fn on_audio(&mut self, data: &[f32], channels: u32, sample_rate: u32) {
        self.write_audio(data, channels, sample_rate);
    }
}

/// Far-end audio tap feeding the echo canceller.
///
/// Does not own the APM: disposing it is up to whoever created it.
pub struct ApmReverseStream {
    drain: FrameDrain,
    apm: SharedApm,
    counters: Arc<CaptureCounters>,
}

impl ApmReverseStream {
    pub fn new(apm: SharedApm, remixer: Arc<dyn Remixer>) -> Self {
        Self {
            drain: FrameDrain::new(DEFAULT_BUFFER_DURATION_MS, remixer),
            apm,
            counters: Arc::new(CaptureCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<CaptureCounters> {
        self.counters.clone()
    }

    pub fn write_audio(&mut self, data: &[f32], channels: u32, sample_rate: u32) {
        self.drain
            .accumulator
            .write_f32(data, AudioFormat::new(channels, sample_rate));

        // Keep the far-end channel layout, only the rate must match
        while let Some(mut frame) = self.drain.next_frame(|f| transport_format(f.channels)) {
            match self.apm.process_reverse_stream(&mut frame) {
                Ok(()) => {
                    self.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(ApmError::InvalidFrame(e)) => {
                    self.counters.frames_invalid.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Error during creation of APM frame: {}", e);
                    break;
                }
                Err(e) => {
                    self.counters.apm_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Error during processing reverse frame: {}", e);
                }
            }
        }
    }
}

impl InputCallback for ApmReverseStream {
    fn on_audio(&mut self, data: &[f32], channels: u32, sample_rate: u32) {
        self.write_audio(data, channels, sample_rate);
    }
}
