//! Audio capture from input devices
//!
//! cpal streams are not `Send`, so each capture owns a dedicated thread that
//! builds the stream, plays it, and keeps it alive until `stop()`. Captured
//! blocks go straight to the registered [`InputCallback`] on the device
//! thread.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::find_input_device;
use crate::audio::InputCallback;
use crate::error::AudioError;

/// Audio capture instance for a single device
pub struct AudioCapture {
    /// Device name, `None` for the host default
    device_name: Option<String>,

    /// Whether capture is running
    running: Arc<AtomicBool>,

    /// Stream thread handle
    thread_handle: Option<JoinHandle<()>>,

    /// Channel for stream errors
    error_rx: Option<Receiver<AudioError>>,

    /// Callback invocations so far
    callbacks: Arc<AtomicU64>,

    /// Total samples captured
    samples_captured: Arc<AtomicU64>,

    /// Stream configuration
    config: StreamConfig,
}

impl AudioCapture {
    /// Create a new audio capture for the named (or default) device
    pub fn new(
        device_name: Option<&str>,
        sample_rate: Option<u32>,
        channels: Option<u16>,
        buffer_size: Option<u32>,
    ) -> Result<Self, AudioError> {
        let device = find_input_device(device_name)?;

        // Get default config and override with requested settings
        let default_config = device.default_input_config()?;

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
            callbacks: Arc::new(AtomicU64::new(0)),
            samples_captured: Arc::new(AtomicU64::new(0)),
            config,
        })
    }

    /// Start capturing audio into `callback`
    pub fn start(&mut self, mut callback: Box<dyn InputCallback>) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let device = find_input_device(self.device_name.as_deref())?;
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        self.error_rx = Some(error_rx);

        let running = self.running.clone();
        let running_for_loop = self.running.clone();
        let callbacks = self.callbacks.clone();
        let samples_captured = self.samples_captured.clone();
        let config = self.config.clone();
        let channels = u32::from(self.config.channels);
        let sample_rate = self.config.sample_rate.0;

        // Reset counters
        self.callbacks.store(0, Ordering::SeqCst);
        self.samples_captured.store(0, Ordering::SeqCst);

        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name(format!("capture-{}", device.name))
            .spawn(move || {
                let cpal_device = device.into_inner();

                let stream = cpal_device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !running.load(Ordering::Relaxed) {
                            return;
                        }

                        callbacks.fetch_add(1, Ordering::Relaxed);
                        samples_captured.fetch_add(data.len() as u64, Ordering::Relaxed);

                        callback.on_audio(data, channels, sample_rate);
                    },
                    move |err| {
                        let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            tracing::error!("Failed to start input stream: {}", e);
                            return;
                        }

                        // Keep thread alive while running
                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }

                        // Stream is dropped here, stopping capture
                    }
                    Err(e) => {
                        tracing::error!("Failed to build input stream: {}", e);
                        running_for_loop.store(false, Ordering::SeqCst);
                    }
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if capture is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get number of callbacks delivered
    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }

    /// Get total samples captured
    pub fn samples_captured(&self) -> u64 {
        self.samples_captured.load(Ordering::Relaxed)
    }

    /// Get the stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
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

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
