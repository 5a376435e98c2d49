//! Format-aware sample accumulator
//!
//! Device callbacks deliver arbitrary block sizes while the transport and APM
//! consume exact 10ms frames. The accumulator sits between them: writes append
//! interleaved PCM in whatever format the producer currently has, reads pull
//! exactly `channels * samples_per_channel` samples in the format the consumer
//! asks for. A format change drops the buffered audio and reallocates.
//!
//! The backing store decides what happens on overflow:
//!
//! * [`ByteRingBuffer`] refuses new samples (capture path, oldest audio wins)
//! * [`TypedRingBuffer`] evicts old samples (playback path, freshest audio wins)

use crate::audio::format::AudioFormat;
use crate::audio::frame::AudioFrame;
use crate::audio::ring_buffer::ByteRingBuffer;
use crate::audio::typed_ring::TypedRingBuffer;
use crate::codec::pcm;
use crate::constants::{BYTES_PER_SAMPLE, DEFAULT_BUFFER_DURATION_MS};

/// Bytes staged on the stack per ring copy
const STAGING_BYTES: usize = 512;

/// Storage for interleaved 16-bit samples.
pub trait SampleStore {
    /// Allocate room for `samples` samples (the store may round up).
    fn with_capacity(samples: usize) -> Self;

    /// Append samples, returning how many were lost to overflow.
    fn push(&mut self, samples: &[i16]) -> usize;

    /// Fill `out` completely or leave the store untouched and return `false`.
    fn pop_exact(&mut self, out: &mut [i16]) -> bool;

    /// Buffered samples
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleStore for ByteRingBuffer {
    fn with_capacity(samples: usize) -> Self {
        ByteRingBuffer::new(samples * BYTES_PER_SAMPLE)
    }

    fn push(&mut self, samples: &[i16]) -> usize {
        let mut staging = [0u8; STAGING_BYTES];
        let mut accepted = 0;

        for chunk in samples.chunks(STAGING_BYTES / BYTES_PER_SAMPLE) {
            let bytes = &mut staging[..chunk.len() * BYTES_PER_SAMPLE];
            for (dst, sample) in bytes.chunks_exact_mut(BYTES_PER_SAMPLE).zip(chunk) {
                dst.copy_from_slice(&sample.to_le_bytes());
            }
            // capacity and writes are always whole samples
            accepted += self.write(bytes) / BYTES_PER_SAMPLE;
        }

        samples.len() - accepted
    }

    fn pop_exact(&mut self, out: &mut [i16]) -> bool {
        if self.available_read() < out.len() * BYTES_PER_SAMPLE {
            return false;
        }

        let mut staging = [0u8; STAGING_BYTES];
        for chunk in out.chunks_mut(STAGING_BYTES / BYTES_PER_SAMPLE) {
            let bytes = &mut staging[..chunk.len() * BYTES_PER_SAMPLE];
            self.read(bytes);
            for (sample, src) in chunk.iter_mut().zip(bytes.chunks_exact(BYTES_PER_SAMPLE)) {
                *sample = i16::from_le_bytes([src[0], src[1]]);
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.available_read() / BYTES_PER_SAMPLE
    }
}

impl SampleStore for TypedRingBuffer<i16> {
    fn with_capacity(samples: usize) -> Self {
        TypedRingBuffer::new(samples)
    }

    fn push(&mut self, samples: &[i16]) -> usize {
        let before = self.overwritten();
        self.enqueue(samples);
        (self.overwritten() - before) as usize
    }

    fn pop_exact(&mut self, out: &mut [i16]) -> bool {
        match self.try_dequeue(out.len()) {
            Some(samples) => {
                out.copy_from_slice(samples);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        TypedRingBuffer::len(self)
    }
}

/// Accumulator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorStats {
    /// Ring reallocations caused by format changes (including the first write)
    pub reallocations: u64,
    /// Samples accepted by the store
    pub samples_written: u64,
    /// Samples lost to overflow (refused or overwritten)
    pub samples_dropped: u64,
    /// Successful frame reads
    pub frames_read: u64,
}

/// Ring buffer plus the format its contents are in.
pub struct SampleAccumulator<S: SampleStore = ByteRingBuffer> {
    store: Option<S>,
    format: AudioFormat,
    buffer_duration_ms: u32,
    /// Reused for float input so the callback does not allocate
    scratch: Vec<i16>,
    stats: AccumulatorStats,
}

/// Capture side: keeps the oldest audio when full
pub type CaptureAccumulator = SampleAccumulator<ByteRingBuffer>;

/// Playback side: keeps the freshest audio when full
pub type PlaybackAccumulator = SampleAccumulator<TypedRingBuffer<i16>>;

impl<S: SampleStore> SampleAccumulator<S> {
    /// Create an unconfigured accumulator holding `buffer_duration_ms` of audio
    /// once the first write fixes the format.
    pub fn new(buffer_duration_ms: u32) -> Self {
        Self {
            store: None,
            format: AudioFormat::UNCONFIGURED,
            buffer_duration_ms,
            scratch: Vec::new(),
            stats: AccumulatorStats::default(),
        }
    }

    /// Append interleaved samples in `format`.
    ///
    /// A format different from the current one discards everything buffered.
    pub fn write(&mut self, samples: &[i16], format: AudioFormat) {
        if !format.is_configured() {
            tracing::trace!("Ignoring {} samples with unconfigured format", samples.len());
            return;
        }

        if self.store.is_none() || format != self.format {
            self.reallocate(format);
        }

        let Some(store) = self.store.as_mut() else {
            return;
        };
        let dropped = store.push(samples);
        self.stats.samples_written += (samples.len() - dropped) as u64;
        if dropped > 0 {
            self.stats.samples_dropped += dropped as u64;
            tracing::trace!("Accumulator overflow: {} samples dropped", dropped);
        }
    }

    /// Convert float samples to PCM and append them.
    pub fn write_f32(&mut self, samples: &[f32], format: AudioFormat) {
        let mut scratch = std::mem::take(&mut self.scratch);
        pcm::encode_into(samples, &mut scratch);
        self.write(&scratch, format);
        self.scratch = scratch;
    }

    /// Pull exactly `samples_per_channel` samples per channel in `format`.
    ///
    /// `None` when the format differs from what is buffered, when the request
    /// is empty, or when not enough audio has accumulated yet.
    pub fn read(&mut self, format: AudioFormat, samples_per_channel: u32) -> Option<AudioFrame> {
        if format != self.format {
            tracing::debug!(
                "Accumulator format mismatch: requested {}, buffered {}",
                format,
                self.format
            );
            return None;
        }
        if samples_per_channel == 0 {
            return None;
        }

        let store = self.store.as_mut()?;
        let needed = format.channels as usize * samples_per_channel as usize;
        if store.len() < needed {
            return None;
        }

        let mut frame = AudioFrame::silent(format, samples_per_channel);
        if !store.pop_exact(frame.samples_mut()) {
            return None;
        }
        self.stats.frames_read += 1;
        Some(frame)
    }

    /// Read `duration_ms` of audio in the currently buffered format.
    pub fn read_duration(&mut self, duration_ms: u32) -> Option<AudioFrame> {
        let format = self.format;
        if !format.is_configured() {
            return None;
        }
        self.read(format, format.samples_per_channel(duration_ms))
    }

    /// Format of the buffered audio, `UNCONFIGURED` before the first write
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Buffered interleaved samples
    pub fn available_samples(&self) -> usize {
        self.store.as_ref().map_or(0, |s| s.len())
    }

    pub fn buffer_duration_ms(&self) -> u32 {
        self.buffer_duration_ms
    }

    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    fn reallocate(&mut self, format: AudioFormat) {
        let capacity = format.samples_for_duration(self.buffer_duration_ms);
        if self.format.is_configured() {
            tracing::debug!(
                "Accumulator format changed {} -> {}, dropping {} samples",
                self.format,
                format,
                self.available_samples()
            );
        }
        self.store = Some(S::with_capacity(capacity));
        self.format = format;
        self.stats.reallocations += 1;
    }
}

impl<S: SampleStore> Default for SampleAccumulator<S> {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_DURATION_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONO_48K: AudioFormat = AudioFormat::new(1, 48000);
    const STEREO_48K: AudioFormat = AudioFormat::new(2, 48000);

    fn ramp(len: usize) -> Vec<i16> {
        (0..len).map(|i| i as i16).collect()
    }

    #[test]
    fn test_starts_unconfigured() {
        let mut acc = CaptureAccumulator::new(200);
        assert_eq!(acc.format(), AudioFormat::UNCONFIGURED);
        assert!(acc.read(MONO_48K, 480).is_none());
        assert_eq!(acc.available_samples(), 0);
    }

    #[test]
    fn test_ignores_unconfigured_writes() {
        let mut acc = CaptureAccumulator::new(200);
        acc.write(&[1, 2, 3], AudioFormat::new(0, 48000));
        acc.write(&[1, 2, 3], AudioFormat::new(2, 0));
        assert_eq!(acc.format(), AudioFormat::UNCONFIGURED);
        assert_eq!(acc.stats().reallocations, 0);
    }

    #[test]
    fn test_25ms_yields_two_10ms_reads() {
        let mut acc = CaptureAccumulator::new(200);
        acc.write(&ramp(1200), MONO_48K);

        let first = acc.read(MONO_48K, 480).unwrap();
        assert_eq!(first.samples()[0], 0);
        assert_eq!(first.samples()[479], 479);
        let second = acc.read(MONO_48K, 480).unwrap();
        assert_eq!(second.samples()[0], 480);
        assert!(acc.read(MONO_48K, 480).is_none());
        assert_eq!(acc.available_samples(), 240);
    }

    #[test]
    fn test_format_switch_discards_state() {
        let mut acc = PlaybackAccumulator::new(200);
        acc.write(&ramp(960 * 2), STEREO_48K);
        acc.write(&ramp(480), MONO_48K);

        assert!(acc.read(STEREO_48K, 480).is_none());
        assert_eq!(acc.available_samples(), 480);
        assert_eq!(acc.stats().reallocations, 2);
        assert!(acc.read(MONO_48K, 480).is_some());
    }

    #[test]
    fn test_zero_length_read() {
        let mut acc = CaptureAccumulator::new(200);
        acc.write(&ramp(480), MONO_48K);
        assert!(acc.read(MONO_48K, 0).is_none());
        assert_eq!(acc.available_samples(), 480);
    }

    #[test]
    fn test_capture_store_refuses_overflow() {
        // 10ms at 48k mono = 480 samples of room
        let mut acc = CaptureAccumulator::new(10);
        acc.write(&ramp(400), MONO_48K);
        acc.write(&ramp(200), MONO_48K);

        assert_eq!(acc.available_samples(), 480);
        assert_eq!(acc.stats().samples_dropped, 120);
        let frame = acc.read(MONO_48K, 480).unwrap();
        // oldest audio survives
        assert_eq!(frame.samples()[0], 0);
        assert_eq!(frame.samples()[400], 0);
        assert_eq!(frame.samples()[479], 79);
    }

    #[test]
    fn test_playback_store_keeps_freshest() {
        // 10ms at 16k mono = 160 samples, the typed ring rounds to 256
        let format = AudioFormat::new(1, 16000);
        let mut acc = PlaybackAccumulator::new(10);
        acc.write(&ramp(300), format);

        assert_eq!(acc.available_samples(), 256);
        assert_eq!(acc.stats().samples_dropped, 44);
        let frame = acc.read(format, 256).unwrap();
        assert_eq!(frame.samples()[0], 44);
        assert_eq!(frame.samples()[255], 299);
    }

    #[test]
    fn test_write_f32_and_read_duration() {
        let mut acc = CaptureAccumulator::default();
        acc.write_f32(&vec![0.5f32; 960], STEREO_48K);

        let frame = acc.read_duration(10).unwrap();
        assert_eq!(frame.format(), STEREO_48K);
        assert_eq!(frame.samples_per_channel(), 480);
        assert!(frame.samples().iter().all(|&s| s == 16384));
        assert_eq!(acc.stats().frames_read, 1);
        assert!(acc.read_duration(10).is_none());
    }
}
