//! Capture Application
//!
//! Records the microphone through the capture pipeline (10ms frames at
//! 48 kHz, validated and run through the APM) and writes the transport frames
//! to a WAV file.
//!
//! Usage: `capture [config.toml] [seconds]`

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rtc_audio_pipeline::{
    apm::{estimate_stream_delay_ms, Apm},
    audio::{capture::AudioCapture, frame::AudioFrame},
    codec::WavWriter,
    config::PipelineConfig,
    pipeline::MicrophoneSource,
    resample::LinearRemixer,
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting capture pipeline");

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => PipelineConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => PipelineConfig::default(),
    };
    let run_for = match args.next() {
        Some(secs) => Duration::from_secs(secs.parse().context("seconds must be a number")?),
        None => Duration::from_secs(10),
    };

    // Acoustic processing
    let apm = Arc::new(Apm::passthrough());
    if config.apm.enabled {
        let delay = config.apm.stream_delay_ms.unwrap_or_else(|| {
            estimate_stream_delay_ms(
                config.apm.device_buffer_len,
                config.apm.device_num_buffers,
                rtc_audio_pipeline::constants::APM_SAMPLE_RATE,
            )
        });
        apm.set_stream_delay_ms(delay)?;
        tracing::info!("APM stream delay set to {} ms", delay);
    } else {
        tracing::info!("APM disabled, frames are validated only");
    }

    // Transport stand-in: frames flow over a channel to a WAV writer
    let (frame_tx, frame_rx) = bounded::<AudioFrame>(64);
    let wav_path = config.wav_tee.directory.join("capture.wav");
    let mut wav = WavWriter::create(&wav_path)
        .with_context(|| format!("creating {}", wav_path.display()))?;

    let writer = thread::Builder::new()
        .name("capture-writer".into())
        .spawn(move || {
            let mut frames = 0u64;
            for frame in frame_rx.iter() {
                if let Err(e) = wav.write_frame(&frame) {
                    tracing::error!("Failed to write frame: {}", e);
                    break;
                }
                frames += 1;
            }
            if let Err(e) = wav.finalize() {
                tracing::error!("Failed to finalize WAV: {}", e);
            }
            frames
        })?;

    let source = MicrophoneSource::with_buffer_duration(
        apm.clone(),
        Arc::new(LinearRemixer),
        frame_tx,
        config.capture.transport_channels,
        config.buffer.duration_ms,
    );
    let counters = source.counters();

    let mut capture = AudioCapture::new(
        config.capture.device.as_deref(),
        config.capture.sample_rate,
        config.capture.channels,
        config.capture.buffer_size,
    )?;
    tracing::info!(
        "Capturing {} ch @ {} Hz for {:?}",
        capture.channels(),
        capture.sample_rate(),
        run_for
    );
    capture.start(Box::new(source))?;

    let started = Instant::now();
    while started.elapsed() < run_for && capture.is_running() {
        thread::sleep(Duration::from_secs(1));

        if let Some(e) = capture.check_errors() {
            tracing::warn!("Capture stream error: {}", e);
        }

        let stats = counters.snapshot();
        tracing::info!(
            "Frames: {} sent, {} dropped, {} invalid, {} APM errors",
            stats.frames_sent,
            stats.frames_dropped,
            stats.frames_invalid,
            stats.apm_errors
        );
    }

    // Stopping drops the source, which closes the channel and lets the writer finish
    capture.stop();
    let frames = writer
        .join()
        .map_err(|_| anyhow::anyhow!("writer thread panicked"))?;

    apm.dispose();
    tracing::info!("Wrote {} frames to {}", frames, wav_path.display());
    Ok(())
}
