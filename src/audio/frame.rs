//! Owned block of interleaved 16-bit PCM

use crate::audio::format::AudioFormat;
use crate::codec::pcm;
use crate::constants::BYTES_PER_SAMPLE;
use crate::error::ValidationError;

/// Audio frame containing interleaved 16-bit samples.
///
/// The sample vector always holds exactly `channels * samples_per_channel`
/// elements. A frame has one owner at a time; dropping it releases the
/// buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    format: AudioFormat,
    samples_per_channel: u32,
    data: Vec<i16>,
}

impl AudioFrame {
    /// Allocate a zeroed frame.
    pub fn silent(format: AudioFormat, samples_per_channel: u32) -> Self {
        let len = format.channels as usize * samples_per_channel as usize;
        Self {
            format,
            samples_per_channel,
            data: vec![0; len],
        }
    }

    /// Wrap existing samples, checking the length invariant.
    pub fn from_samples(
        format: AudioFormat,
        samples_per_channel: u32,
        data: Vec<i16>,
    ) -> Result<Self, ValidationError> {
        let expected = format.channels as usize * samples_per_channel as usize;
        if data.len() != expected {
            return Err(ValidationError::DataLengthMismatch {
                data_len: data.len(),
                samples_per_channel,
                channels: format.channels,
            });
        }
        Ok(Self {
            format,
            samples_per_channel,
            data,
        })
    }

    /// Build a frame from float samples as delivered by a device callback.
    ///
    /// Trailing samples that do not fill a whole interleaved group are dropped.
    pub fn from_f32(format: AudioFormat, samples: &[f32]) -> Result<Self, ValidationError> {
        if format.channels == 0 {
            return Err(ValidationError::ZeroChannels);
        }
        let channels = format.channels as usize;
        let samples_per_channel = samples.len() / channels;
        let mut data = Vec::with_capacity(samples_per_channel * channels);
        pcm::encode_into(&samples[..samples_per_channel * channels], &mut data);
        Ok(Self {
            format,
            samples_per_channel: samples_per_channel as u32,
            data,
        })
    }

    /// Trim or extend the frame to `samples_per_channel`.
    ///
    /// Extra samples repeat the last interleaved group (silence if empty).
    pub fn resize(&mut self, samples_per_channel: u32) {
        let channels = self.format.channels as usize;
        let len = channels * samples_per_channel as usize;
        if len <= self.data.len() {
            self.data.truncate(len);
        } else {
            let last = match self.data.len().checked_sub(channels) {
                Some(start) => self.data[start..].to_vec(),
                None => vec![0; channels],
            };
            while self.data.len() < len {
                self.data.extend_from_slice(&last);
            }
        }
        self.samples_per_channel = samples_per_channel;
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn channels(&self) -> u32 {
        self.format.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn samples_per_channel(&self) -> u32 {
        self.samples_per_channel
    }

    pub fn samples(&self) -> &[i16] {
        &self.data
    }

    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.data
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.data
    }

    /// Buffer length in bytes (`channels * samples_per_channel * 2`).
    pub fn byte_len(&self) -> usize {
        self.data.len() * BYTES_PER_SAMPLE
    }

    /// Frame duration in microseconds
    pub fn duration_us(&self) -> u64 {
        if self.format.sample_rate == 0 {
            return 0;
        }
        u64::from(self.samples_per_channel) * 1_000_000 / u64::from(self.format.sample_rate)
    }
}
