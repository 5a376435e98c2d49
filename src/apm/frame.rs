//! 10ms frame validity guard
//!
//! Acoustic processing only accepts exactly 10ms of 48 kHz audio. A
//! [`ValidFrame`] can only be obtained through [`validate`], so a frame that
//! reaches the processor has already passed every shape check.

use crate::audio::frame::AudioFrame;
use crate::constants::{APM_SAMPLE_RATE, FRAME_DURATION_MS};
use crate::error::ValidationError;

/// A frame proven to be 10ms of 48 kHz PCM.
#[derive(Debug)]
pub struct ValidFrame<'a> {
    frame: &'a mut AudioFrame,
}

impl<'a> ValidFrame<'a> {
    pub fn channels(&self) -> u32 {
        self.frame.channels()
    }

    pub fn sample_rate(&self) -> u32 {
        self.frame.sample_rate()
    }

    pub fn samples_per_channel(&self) -> u32 {
        self.frame.samples_per_channel()
    }

    pub fn samples(&self) -> &[i16] {
        self.frame.samples()
    }

    /// Processors work in place
    pub fn samples_mut(&mut self) -> &mut [i16] {
        self.frame.samples_mut()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.frame.byte_len()
    }
}

/// Check a frame and borrow it as a [`ValidFrame`].
pub fn validate(frame: &mut AudioFrame) -> Result<ValidFrame<'_>, ValidationError> {
    validate_parts(
        frame.samples(),
        frame.channels(),
        frame.samples_per_channel(),
        frame.sample_rate(),
    )?;
    Ok(ValidFrame { frame })
}

/// Shape checks on raw parts, in the order the processor would trip on them.
pub fn validate_parts(
    data: &[i16],
    channels: u32,
    samples_per_channel: u32,
    sample_rate: u32,
) -> Result<(), ValidationError> {
    if channels == 0 {
        return Err(ValidationError::ZeroChannels);
    }

    if sample_rate != APM_SAMPLE_RATE {
        return Err(ValidationError::UnsupportedSampleRate {
            expected: APM_SAMPLE_RATE,
            actual: sample_rate,
        });
    }

    let expected = sample_rate * FRAME_DURATION_MS / 1000;
    if samples_per_channel != expected {
        return Err(ValidationError::DurationMismatch {
            expected,
            actual: samples_per_channel,
        });
    }

    if data.len() != samples_per_channel as usize * channels as usize {
        return Err(ValidationError::DataLengthMismatch {
            data_len: data.len(),
            samples_per_channel,
            channels,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::AudioFormat;

    #[test]
    fn test_accepts_10ms_at_48k() {
        let mut frame = AudioFrame::silent(AudioFormat::new(2, 48000), 480);
        let valid = validate(&mut frame).unwrap();
        assert_eq!(valid.samples_per_channel(), 480);
        assert_eq!(valid.size_in_bytes(), 1920);
    }

    #[test]
    fn test_rejects_wrong_duration() {
        let mut frame = AudioFrame::silent(AudioFormat::new(1, 48000), 500);
        assert_eq!(
            validate(&mut frame).unwrap_err(),
            ValidationError::DurationMismatch {
                expected: 480,
                actual: 500,
            }
        );
    }

    #[test]
    fn test_rejects_zero_channels_first() {
        // zero channels wins over the bad rate
        assert_eq!(
            validate_parts(&[], 0, 480, 44100),
            Err(ValidationError::ZeroChannels)
        );
    }

    #[test]
    fn test_rejects_other_rates() {
        let mut frame = AudioFrame::silent(AudioFormat::new(1, 44100), 441);
        assert_eq!(
            validate(&mut frame).unwrap_err(),
            ValidationError::UnsupportedSampleRate {
                expected: 48000,
                actual: 44100,
            }
        );
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let data = vec![0i16; 959];
        assert_eq!(
            validate_parts(&data, 2, 480, 48000),
            Err(ValidationError::DataLengthMismatch {
                data_len: 959,
                samples_per_channel: 480,
                channels: 2,
            })
        );
    }

    #[test]
    fn test_in_place_mutation() {
        let mut frame = AudioFrame::silent(AudioFormat::new(1, 48000), 480);
        {
            let mut valid = validate(&mut frame).unwrap();
            valid.samples_mut()[0] = 42;
        }
        assert_eq!(frame.samples()[0], 42);
    }
}
