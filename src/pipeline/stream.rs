//! Playback stream buffer and its real-time reader
//!
//! The resample worker writes converted frames into a [`StreamBuffer`]; the
//! output device callback drains it through a [`PlaybackStream`]. Both sides
//! meet at one mutex per stream.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::audio::buffer::{AccumulatorStats, PlaybackAccumulator};
use crate::audio::format::AudioFormat;
use crate::audio::frame::AudioFrame;
use crate::audio::guarded::SharedBuffer;
use crate::audio::OutputCallback;
use crate::codec::pcm;
use crate::codec::wav::WavWriter;
use crate::error::CodecError;
use crate::pipeline::worker::{ResampleWorker, StreamId};

type WavFile = WavWriter<BufWriter<File>>;

/// Debug copies of what arrived and what was queued for playback
struct WavTee {
    dir: PathBuf,
    name: String,
    /// Bumped each time a format change forces new files
    segment: u32,
    raw: WavFile,
    resampled: WavFile,
}

impl WavTee {
    fn open(dir: &Path, name: &str, segment: u32) -> Result<Self, CodecError> {
        let suffix = if segment == 0 {
            String::new()
        } else {
            format!("-{}", segment)
        };
        let raw = WavWriter::create(dir.join(format!("{}-raw{}.wav", name, suffix)))?;
        let resampled = WavWriter::create(dir.join(format!("{}-resampled{}.wav", name, suffix)))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            segment,
            raw,
            resampled,
        })
    }

    fn accepts(&self, raw: &AudioFrame, converted: &AudioFrame) -> bool {
        self.raw.format().map_or(true, |f| f == raw.format())
            && self.resampled.format().map_or(true, |f| f == converted.format())
    }

    fn finalize(self) -> Result<(), CodecError> {
        self.raw.finalize()?;
        self.resampled.finalize()?;
        Ok(())
    }

    /// Close these files and continue in the next segment.
    fn restart(self) -> Result<Self, CodecError> {
        let (dir, name, segment) = (self.dir.clone(), self.name.clone(), self.segment + 1);
        self.finalize()?;
        Self::open(&dir, &name, segment)
    }

    fn write(&mut self, raw: &AudioFrame, converted: &AudioFrame) -> Result<(), CodecError> {
        self.raw.write_frame(raw)?;
        self.resampled.write_frame(converted)
    }
}

/// Accumulator for one remote stream, plus its optional WAV tee.
pub struct StreamBuffer {
    accumulator: PlaybackAccumulator,
    tee: Option<WavTee>,
}

impl StreamBuffer {
    pub fn new(buffer_duration_ms: u32) -> Self {
        Self {
            accumulator: PlaybackAccumulator::new(buffer_duration_ms),
            tee: None,
        }
    }

    /// Store a converted frame; `raw` is what the transport delivered.
    ///
    /// A format change on either side restarts the tee in new files.
    pub fn write(&mut self, raw: &AudioFrame, converted: &AudioFrame) {
        if let Some(tee) = self.tee.take() {
            let tee = if tee.accepts(raw, converted) {
                Ok(tee)
            } else {
                tracing::debug!(
                    "WAV tee format changed to {} / {}, restarting",
                    raw.format(),
                    converted.format()
                );
                tee.restart()
            };
            let result = tee.and_then(|mut tee| tee.write(raw, converted).map(|_| tee));

            match result {
                Ok(tee) => self.tee = Some(tee),
                Err(e) => tracing::warn!("WAV tee failed, disabling: {}", e),
            }
        }

        self.accumulator.write(converted.samples(), converted.format());
    }

    pub fn read(&mut self, format: AudioFormat, samples_per_channel: u32) -> Option<AudioFrame> {
        self.accumulator.read(format, samples_per_channel)
    }

    /// Start mirroring into `<dir>/<name>-raw.wav` and `<dir>/<name>-resampled.wav`.
    ///
    /// Replaces (and finalizes) any tee already running. After a format change
    /// the files continue as `<name>-raw-1.wav`, `<name>-raw-2.wav` and so on.
    pub fn start_wav_tee(&mut self, dir: &Path, name: &str) -> Result<(), CodecError> {
        self.stop_wav_tee()?;
        self.tee = Some(WavTee::open(dir, name, 0)?);
        Ok(())
    }

    /// Finalize the WAV files, if any.
    pub fn stop_wav_tee(&mut self) -> Result<(), CodecError> {
        match self.tee.take() {
            Some(tee) => tee.finalize(),
            None => Ok(()),
        }
    }

    pub fn is_teeing(&self) -> bool {
        self.tee.is_some()
    }

    pub fn format(&self) -> AudioFormat {
        self.accumulator.format()
    }

    pub fn available_samples(&self) -> usize {
        self.accumulator.available_samples()
    }

    pub fn stats(&self) -> AccumulatorStats {
        self.accumulator.stats()
    }
}

/// Real-time reader for one stream, handed to the output device.
pub struct PlaybackStream {
    id: StreamId,
    buffer: SharedBuffer<StreamBuffer>,
    worker: ResampleWorker,
    /// Last format the sink asked for
    sink_format: AudioFormat,
    underruns: u64,
}

impl PlaybackStream {
    pub(crate) fn new(
        id: StreamId,
        buffer: SharedBuffer<StreamBuffer>,
        worker: ResampleWorker,
        sink_format: AudioFormat,
    ) -> Self {
        Self {
            id,
            buffer,
            worker,
            sink_format,
            underruns: 0,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Fill `data` with one callback's worth of audio, or silence.
    pub fn read_audio(&mut self, data: &mut [f32], channels: u32, sample_rate: u32) {
        data.fill(0.0);
        if channels == 0 || sample_rate == 0 {
            return;
        }

        let format = AudioFormat::new(channels, sample_rate);
        if format != self.sink_format {
            tracing::debug!("{} sink format {} -> {}", self.id, self.sink_format, format);
            self.sink_format = format;
            if let Err(e) = self.worker.set_target_format(self.id, format) {
                tracing::debug!("Cannot renegotiate {}: {}", self.id, e);
            }
        }

        let samples_per_channel = (data.len() / channels as usize) as u32;
        match self.buffer.with(|b| b.read(format, samples_per_channel)) {
            Some(Some(frame)) => {
                pcm::decode_into(frame.samples(), data);
            }
            Some(None) => self.underruns += 1,
            // closed: keep playing silence
            None => {}
        }
    }

    /// Callbacks that found too little audio buffered
    pub fn underruns(&self) -> u64 {
        self.underruns
    }
}

impl OutputCallback for PlaybackStream {
    fn on_audio(&mut self, data: &mut [f32], channels: u32, sample_rate: u32) {
        self.read_audio(data, channels, sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::guarded::MutexGuardedBuffer;

    const STEREO_48K: AudioFormat = AudioFormat::new(2, 48000);

    fn frame(value: i16) -> AudioFrame {
        AudioFrame::from_samples(STEREO_48K, 480, vec![value; 960]).unwrap()
    }

    #[test]
    fn test_buffer_write_read() {
        let mut buffer = StreamBuffer::new(200);
        let f = frame(8192);
        buffer.write(&f, &f);
        assert_eq!(buffer.available_samples(), 960);
        assert_eq!(buffer.read(STEREO_48K, 480), Some(f));
    }

    #[test]
    fn test_wav_tee_writes_both_files() {
        let dir = std::env::temp_dir().join(format!("stream-tee-{}", std::process::id()));
        let mut buffer = StreamBuffer::new(200);
        buffer.start_wav_tee(&dir, "track").unwrap();
        assert!(buffer.is_teeing());

        let raw = AudioFrame::silent(AudioFormat::new(1, 24000), 240);
        buffer.write(&raw, &frame(1));
        buffer.stop_wav_tee().unwrap();
        assert!(!buffer.is_teeing());

        let raw_len = std::fs::metadata(dir.join("track-raw.wav")).unwrap().len();
        let resampled_len = std::fs::metadata(dir.join("track-resampled.wav")).unwrap().len();
        assert_eq!(raw_len, 44 + 480);
        assert_eq!(resampled_len, 44 + 1920);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_wav_tee_restarts_on_format_change() {
        let dir = std::env::temp_dir().join(format!("stream-tee-restart-{}", std::process::id()));
        let mut buffer = StreamBuffer::new(200);
        buffer.start_wav_tee(&dir, "track").unwrap();

        let raw = AudioFrame::silent(AudioFormat::new(1, 24000), 240);
        buffer.write(&raw, &frame(1));

        // the sink renegotiated to mono 16k
        let converted = AudioFrame::silent(AudioFormat::new(1, 16000), 160);
        buffer.write(&raw, &converted);
        assert!(buffer.is_teeing());
        buffer.stop_wav_tee().unwrap();

        let len = |file: &str| std::fs::metadata(dir.join(file)).unwrap().len();
        assert_eq!(len("track-resampled.wav"), 44 + 1920);
        assert_eq!(len("track-resampled-1.wav"), 44 + 320);
        assert_eq!(len("track-raw.wav"), 44 + 480);
        assert_eq!(len("track-raw-1.wav"), 44 + 480);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_reader_decodes_and_zero_fills() {
        let worker = ResampleWorker::default();
        let shared = MutexGuardedBuffer::shared(StreamBuffer::new(200));
        let f = frame(16384);
        shared.with(|b| b.write(&f, &f));

        let mut reader = PlaybackStream::new(StreamId(1), shared.clone(), worker, STEREO_48K);
        let mut out = vec![1.0f32; 960];
        reader.read_audio(&mut out, 2, 48000);
        assert!(out.iter().all(|&s| s == 0.5));

        // nothing left: silence, counted as underrun
        reader.read_audio(&mut out, 2, 48000);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(reader.underruns(), 1);

        shared.dispose();
        out.fill(1.0);
        reader.read_audio(&mut out, 2, 48000);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_reader_renegotiates_target() {
        let worker = ResampleWorker::default();
        let shared = MutexGuardedBuffer::shared(StreamBuffer::new(200));
        worker
            .register(StreamId(5), AudioFormat::UNCONFIGURED, shared.clone())
            .unwrap();

        let mut reader = PlaybackStream::new(StreamId(5), shared, worker.clone(), AudioFormat::UNCONFIGURED);
        let mut out = vec![0.0f32; 441];
        reader.read_audio(&mut out, 1, 44100);

        let frame = AudioFrame::silent(AudioFormat::new(1, 48000), 480);
        assert!(worker.enqueue(StreamId(5), frame));
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while worker.stats().frames_processed == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(worker.stats().frames_processed, 1);
        assert_eq!(worker.stats().frames_awaiting_format, 0);
    }
}
