//! Pipeline configuration
//!
//! Loaded from TOML; every section and field is optional and falls back to
//! the defaults below.
//!
//! ```toml
//! [buffer]
//! duration_ms = 200
//!
//! [worker]
//! queue_capacity = 256
//!
//! [apm]
//! enabled = true
//!
//! [capture]
//! device = "USB Microphone"
//! transport_channels = 2
//!
//! [wav_tee]
//! enabled = true
//! directory = "wav-tee"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_BUFFER_DURATION_MS, DEFAULT_CHANNELS, WORKER_QUEUE_CAPACITY};
use crate::error::{Error, Result};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub buffer: BufferConfig,
    pub worker: WorkerConfig,
    pub apm: ApmConfig,
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
    pub wav_tee: WavTeeConfig,
}

/// Accumulator sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Audio held per accumulator before overflow handling kicks in
    pub duration_ms: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_BUFFER_DURATION_MS,
        }
    }
}

/// Resample worker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Frames queued across all streams before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: WORKER_QUEUE_CAPACITY,
        }
    }
}

/// Acoustic processing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApmConfig {
    /// Run frames through the processor (otherwise validate only)
    pub enabled: bool,
    /// Fixed stream delay; estimated from the device buffer when unset
    pub stream_delay_ms: Option<i32>,
    /// Device buffer length in frames, used for the delay estimate
    pub device_buffer_len: u32,
    /// Number of device buffers, used for the delay estimate
    pub device_num_buffers: u32,
}

impl Default for ApmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stream_delay_ms: None,
            device_buffer_len: 1024,
            device_num_buffers: 4,
        }
    }
}

/// Input device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device name, host default when unset
    pub device: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub buffer_size: Option<u32>,
    /// Channel count of frames handed to the transport
    pub transport_channels: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: None,
            channels: None,
            buffer_size: None,
            transport_channels: DEFAULT_CHANNELS,
        }
    }
}

/// Output device settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub device: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub buffer_size: Option<u32>,
}

/// Debug WAV mirroring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WavTeeConfig {
    pub enabled: bool,
    pub directory: PathBuf,
}

impl Default for WavTeeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("wav-tee"),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer.duration_ms == 0 {
            return Err(Error::Config("buffer.duration_ms must be positive".into()));
        }
        if self.worker.queue_capacity == 0 {
            return Err(Error::Config("worker.queue_capacity must be positive".into()));
        }
        if self.capture.transport_channels == 0 {
            return Err(Error::Config("capture.transport_channels must be positive".into()));
        }
        if self.capture.sample_rate == Some(0) || self.playback.sample_rate == Some(0) {
            return Err(Error::Config("sample_rate must be positive when set".into()));
        }
        if self.capture.channels == Some(0) || self.playback.channels == Some(0) {
            return Err(Error::Config("channels must be positive when set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.buffer.duration_ms, 200);
        assert_eq!(config.worker.queue_capacity, 256);
        assert!(config.apm.enabled);
        assert!(!config.wav_tee.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [capture]
            device = "USB Microphone"
            sample_rate = 44100

            [wav_tee]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.device.as_deref(), Some("USB Microphone"));
        assert_eq!(config.capture.sample_rate, Some(44100));
        assert_eq!(config.capture.transport_channels, 2);
        assert!(config.wav_tee.enabled);
        assert_eq!(config.wav_tee.directory, PathBuf::from("wav-tee"));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = PipelineConfig::default();
        config.apm.stream_delay_ms = Some(40);
        config.playback.device = Some("Speakers".into());

        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = PipelineConfig::from_toml_str("[buffer]\nduration_ms = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(PipelineConfig::from_toml_str("[worker]\nqueue_capacity = 0").is_err());
        assert!(PipelineConfig::from_toml_str("[playback]\nsample_rate = 0").is_err());
        assert!(PipelineConfig::from_toml_str("[buffer]\nduration_ms = \"long\"").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load("/nonexistent/pipeline.toml").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: Cannot read"));
    }
}
