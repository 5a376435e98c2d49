//! Channel count / sample rate pair shared by buffers and frames

use std::fmt;

use crate::constants::APM_SAMPLE_RATE;

/// The `(channels, sample rate)` a buffer or frame is configured for.
///
/// `AudioFormat::UNCONFIGURED` (`{0, 0}`) is the state of a buffer that has
/// not seen its first write yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AudioFormat {
    pub channels: u32,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub const UNCONFIGURED: AudioFormat = AudioFormat {
        channels: 0,
        sample_rate: 0,
    };

    pub const fn new(channels: u32, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Stereo/mono at the rate acoustic processing and the transport run at.
    pub const fn at_48k(channels: u32) -> Self {
        Self::new(channels, APM_SAMPLE_RATE)
    }

    pub fn is_configured(&self) -> bool {
        self.channels != 0 && self.sample_rate != 0
    }

    /// Samples per channel covering `duration_ms`.
    pub fn samples_per_channel(&self, duration_ms: u32) -> u32 {
        (u64::from(self.sample_rate) * u64::from(duration_ms) / 1000) as u32
    }

    /// Interleaved samples (all channels) covering `duration_ms`.
    pub fn samples_for_duration(&self, duration_ms: u32) -> usize {
        self.samples_per_channel(duration_ms) as usize * self.channels as usize
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ch@{}Hz", self.channels, self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_equality() {
        assert_eq!(AudioFormat::new(2, 48000), AudioFormat::at_48k(2));
        assert_ne!(AudioFormat::new(2, 48000), AudioFormat::new(1, 48000));
        assert_ne!(AudioFormat::new(2, 48000), AudioFormat::new(2, 44100));
    }

    #[test]
    fn test_unconfigured() {
        assert!(!AudioFormat::UNCONFIGURED.is_configured());
        assert!(!AudioFormat::new(0, 48000).is_configured());
        assert!(!AudioFormat::new(2, 0).is_configured());
        assert!(AudioFormat::new(1, 16000).is_configured());
    }

    #[test]
    fn test_duration_math() {
        let format = AudioFormat::new(2, 44100);
        assert_eq!(format.samples_per_channel(10), 441);
        assert_eq!(format.samples_for_duration(10), 882);
        assert_eq!(AudioFormat::new(1, 48000).samples_for_duration(200), 9600);
    }
}
