//! Audio playback to output devices
//!
//! Mirror of [`AudioCapture`](crate::audio::capture::AudioCapture): a
//! dedicated thread owns the cpal output stream and the registered
//! [`OutputCallback`] fills every block the device asks for.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::find_output_device;
use crate::audio::OutputCallback;
use crate::error::AudioError;

/// Audio playback instance for a single device
pub struct AudioPlayback {
    device_name: Option<String>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Option<Receiver<AudioError>>,
    /// Total samples handed to the device
    samples_played: Arc<AtomicU64>,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a playback for the named (or default) output device
    pub fn new(
        device_name: Option<&str>,
        sample_rate: Option<u32>,
        channels: Option<u16>,
        buffer_size: Option<u32>,
    ) -> Result<Self, AudioError> {
        let device = find_output_device(device_name)?;
        let default_config = device.default_output_config()?;

        let config = StreamConfig {
            channels: channels.unwrap_or(default_config.channels()),
            sample_rate: sample_rate
                .map(cpal::SampleRate)
                .unwrap_or(default_config.sample_rate()),
            buffer_size: match buffer_size {
                Some(size) => cpal::BufferSize::Fixed(size),
                None => cpal::BufferSize::Default,
            },
        };

        Ok(Self {
            device_name: device_name.map(str::to_string),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            error_rx: None,
            samples_played: Arc::new(AtomicU64::new(0)),
            config,
        })
    }

    /// Start playback pulling from `callback`
    pub fn start(&mut self, mut callback: Box<dyn OutputCallback>) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let device = find_output_device(self.device_name.as_deref())?;
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        self.error_rx = Some(error_rx);

        let running = self.running.clone();
        let running_for_loop = self.running.clone();
        let samples_played = self.samples_played.clone();
        let config = self.config.clone();
        let channels = u32::from(self.config.channels);
        let sample_rate = self.config.sample_rate.0;

        self.samples_played.store(0, Ordering::SeqCst);
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name(format!("playback-{}", device.name))
            .spawn(move || {
                let cpal_device = device.into_inner();

                let stream = cpal_device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        if !running.load(Ordering::Relaxed) {
                            data.fill(0.0);
                            return;
                        }

                        callback.on_audio(data, channels, sample_rate);
                        samples_played.fetch_add(data.len() as u64, Ordering::Relaxed);
                    },
                    move |err| {
                        let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            tracing::error!("Failed to start output stream: {}", e);
                            return;
                        }

                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to build output stream: {}", e);
                        running_for_loop.store(false, Ordering::SeqCst);
                    }
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn samples_played(&self) -> u64 {
        self.samples_played.load(Ordering::Relaxed)
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Check for errors
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}
