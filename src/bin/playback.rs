//! Playback Application
//!
//! Plays a synthetic remote track (440 Hz, mono, 24 kHz, delivered as 10ms
//! frames like a transport would) through the resample worker to the default
//! output device.
//!
//! Usage: `playback [config.toml] [seconds]`

use anyhow::{Context, Result};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rtc_audio_pipeline::{
    audio::{format::AudioFormat, frame::AudioFrame, playback::AudioPlayback},
    config::PipelineConfig,
    constants::FRAME_DURATION_MS,
    error::ValidationError,
    pipeline::{PlaybackStreams, ResampleWorker},
    resample::LinearRemixer,
};

/// Format of the synthetic remote track
const REMOTE_FORMAT: AudioFormat = AudioFormat::new(1, 24000);
const TONE_HZ: f32 = 440.0;
const TONE_AMPLITUDE: f32 = 0.2;

/// Generates consecutive 10ms frames of a sine tone
struct ToneSource {
    phase: f32,
    step: f32,
}

impl ToneSource {
    fn new(format: AudioFormat, frequency: f32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency / format.sample_rate as f32,
        }
    }

    fn next_frame(&mut self, format: AudioFormat) -> Result<AudioFrame, ValidationError> {
        let samples_per_channel = format.samples_per_channel(FRAME_DURATION_MS) as usize;
        let mut samples = Vec::with_capacity(samples_per_channel * format.channels as usize);
        for _ in 0..samples_per_channel {
            let value = self.phase.sin() * TONE_AMPLITUDE;
            self.phase = (self.phase + self.step) % TAU;
            samples.extend(std::iter::repeat(value).take(format.channels as usize));
        }
        AudioFrame::from_f32(format, &samples)
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting playback pipeline");

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => PipelineConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => PipelineConfig::default(),
    };
    let run_for = match args.next() {
        Some(secs) => Duration::from_secs(secs.parse().context("seconds must be a number")?),
        None => Duration::from_secs(10),
    };

    let worker = ResampleWorker::new(Arc::new(LinearRemixer), config.worker.queue_capacity);
    let streams = PlaybackStreams::new(worker, config.buffer.duration_ms);

    let mut playback = AudioPlayback::new(
        config.playback.device.as_deref(),
        config.playback.sample_rate,
        config.playback.channels,
        config.playback.buffer_size,
    )?;
    let sink_format = AudioFormat::new(u32::from(playback.channels()), playback.sample_rate());
    tracing::info!("Output device format {}", sink_format);

    let stream = streams.open(sink_format)?;
    let id = stream.id();
    if config.wav_tee.enabled {
        streams.start_wav_tee(id, &config.wav_tee.directory)?;
    }
    playback.start(Box::new(stream))?;

    // Deliver one frame every 10ms, scheduled against the start time so the
    // cadence does not drift
    let mut tone = ToneSource::new(REMOTE_FORMAT, TONE_HZ);
    let frame_period = Duration::from_millis(u64::from(FRAME_DURATION_MS));
    let started = Instant::now();
    let mut next_frame_at = started;
    let mut last_stats = started;

    while started.elapsed() < run_for && playback.is_running() {
        streams.deliver(id, tone.next_frame(REMOTE_FORMAT)?);
        next_frame_at += frame_period;

        if let Some(wait) = next_frame_at.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }

        if last_stats.elapsed() >= Duration::from_secs(1) {
            last_stats = Instant::now();
            if let Some(e) = playback.check_errors() {
                tracing::warn!("Playback stream error: {}", e);
            }
            let stats = streams.worker().stats();
            tracing::info!(
                "Worker: {} processed, {} queue-full, {} remix failures, {} awaiting format",
                stats.frames_processed,
                stats.queue_full,
                stats.remix_failures,
                stats.frames_awaiting_format
            );
        }
    }

    playback.stop();
    streams.close(id);
    tracing::info!("Played {} samples", playback.samples_played());
    Ok(())
}
