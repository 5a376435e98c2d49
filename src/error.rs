//! Error types for the audio frame pipeline

use thiserror::Error;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Invalid frame: {0}")]
    Validation(#[from] ValidationError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Remix error: {0}")]
    Remix(#[from] RemixError),

    #[error("APM error: {0}")]
    Apm(#[from] ApmError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio device errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Frame shape violations caught before a frame reaches acoustic processing.
///
/// The processor faults on anything that is not exactly 10ms at 48 kHz, so
/// each variant names the invariant that broke.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Number of channels cannot be zero")]
    ZeroChannels,

    #[error("Sample rate must be {expected} Hz, got {actual} Hz")]
    UnsupportedSampleRate { expected: u32, actual: u32 },

    #[error("Frame must be 10 ms long: expected {expected} samples per channel, got {actual}")]
    DurationMismatch { expected: u32, actual: u32 },

    #[error(
        "Data length ({data_len}) does not match samples per channel ({samples_per_channel}) * channels ({channels})"
    )]
    DataLengthMismatch {
        data_len: usize,
        samples_per_channel: u32,
        channels: u32,
    },
}

/// PCM / WAV codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("All frames must share one format: started as {expected}, got {actual}")]
    FormatChanged { expected: String, actual: String },

    #[error("Cannot write samples with an unconfigured format")]
    UnconfiguredFormat,

    #[error("WAV writer already finalized")]
    Finalized,

    #[error("WAV IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remix/resample collaborator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemixError {
    #[error("Invalid source frame: {0}")]
    InvalidSource(String),

    #[error("Invalid target format: {0}")]
    InvalidTarget(String),

    #[error("Remix failed: {0}")]
    Failed(String),
}

/// Acoustic processing errors
#[derive(Error, Debug)]
pub enum ApmError {
    #[error("Frame rejected: {0}")]
    InvalidFrame(#[from] ValidationError),

    #[error("APM instance is already disposed")]
    Disposed,

    #[error("Processing failed: {0}")]
    Processing(String),
}

/// Resample worker errors
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker thread: {0}")]
    SpawnFailed(String),

    #[error("Stream {0} is not registered")]
    NotRegistered(u64),
}

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::DurationMismatch {
            expected: 480,
            actual: 500,
        };
        assert_eq!(
            err.to_string(),
            "Frame must be 10 ms long: expected 480 samples per channel, got 500"
        );
    }

    #[test]
    fn test_error_from_apm() {
        let err: Error = ApmError::Disposed.into();
        assert!(matches!(err, Error::Apm(ApmError::Disposed)));
        assert_eq!(err.to_string(), "APM error: APM instance is already disposed");
    }

    #[test]
    fn test_apm_error_wraps_validation() {
        let err: ApmError = ValidationError::ZeroChannels.into();
        assert_eq!(err.to_string(), "Frame rejected: Number of channels cannot be zero");
    }
}
