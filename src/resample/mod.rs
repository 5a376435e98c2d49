//! Channel remixing and sample rate conversion
//!
//! The pipeline treats remix/resample as an external collaborator behind
//! [`Remixer`]. [`LinearRemixer`] is the built-in implementation: channel
//! averaging/duplication plus per-channel linear interpolation. It is
//! stateless, so consecutive frames are converted independently; good enough
//! for voice, not for music.

use crate::audio::format::AudioFormat;
use crate::audio::frame::AudioFrame;
use crate::constants::APM_SAMPLE_RATE;
use crate::error::RemixError;

/// Converts a frame to another channel count and sample rate.
pub trait Remixer: Send + Sync {
    fn remix_and_resample(
        &self,
        frame: &AudioFrame,
        target: AudioFormat,
    ) -> Result<AudioFrame, RemixError>;

    /// Convert to exactly `samples_per_channel` samples per channel.
    ///
    /// Fixed-duration consumers need this when the source rate does not divide
    /// evenly into their frame length.
    fn remix_and_resample_exact(
        &self,
        frame: &AudioFrame,
        target: AudioFormat,
        samples_per_channel: u32,
    ) -> Result<AudioFrame, RemixError> {
        let mut converted = self.remix_and_resample(frame, target)?;
        converted.resize(samples_per_channel);
        Ok(converted)
    }
}

/// Format the transport and acoustic processing run at.
pub fn transport_format(channels: u32) -> AudioFormat {
    AudioFormat::new(channels, APM_SAMPLE_RATE)
}

/// Stateless linear-interpolation remixer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearRemixer;

impl Remixer for LinearRemixer {
    fn remix_and_resample(
        &self,
        frame: &AudioFrame,
        target: AudioFormat,
    ) -> Result<AudioFrame, RemixError> {
        self.convert(frame, target, None)
    }

    fn remix_and_resample_exact(
        &self,
        frame: &AudioFrame,
        target: AudioFormat,
        samples_per_channel: u32,
    ) -> Result<AudioFrame, RemixError> {
        self.convert(frame, target, Some(samples_per_channel))
    }
}

impl LinearRemixer {
    fn convert(
        &self,
        frame: &AudioFrame,
        target: AudioFormat,
        output_len: Option<u32>,
    ) -> Result<AudioFrame, RemixError> {
        if !target.is_configured() {
            return Err(RemixError::InvalidTarget(target.to_string()));
        }
        let source = frame.format();
        if !source.is_configured() {
            return Err(RemixError::InvalidSource(source.to_string()));
        }
        if frame.samples().len() != source.channels as usize * frame.samples_per_channel() as usize
        {
            return Err(RemixError::InvalidSource(format!(
                "{} samples do not fill {} x {}",
                frame.samples().len(),
                frame.samples_per_channel(),
                source.channels
            )));
        }
        if source == target {
            let mut copy = frame.clone();
            if let Some(len) = output_len {
                copy.resize(len);
            }
            return Ok(copy);
        }

        let remixed = remix_channels(frame.samples(), source.channels, target.channels);
        let samples_per_channel = output_len.unwrap_or_else(|| {
            resampled_len(frame.samples_per_channel(), source.sample_rate, target.sample_rate)
        });
        let data = resample_interleaved(
            &remixed,
            target.channels as usize,
            source.sample_rate,
            target.sample_rate,
            samples_per_channel as usize,
        );

        AudioFrame::from_samples(target, samples_per_channel, data)
            .map_err(|e| RemixError::Failed(e.to_string()))
    }
}

/// Output length for `samples_per_channel` input samples, rounded to nearest.
pub fn resampled_len(samples_per_channel: u32, from_rate: u32, to_rate: u32) -> u32 {
    let from = u64::from(from_rate);
    ((u64::from(samples_per_channel) * u64::from(to_rate) + from / 2) / from) as u32
}

/// Convert interleaved samples between channel counts at the same rate.
///
/// Downmixing averages every source channel that folds onto an output channel
/// (`src % dst`); upmixing repeats source channels round-robin.
pub fn remix_channels(samples: &[i16], src_channels: u32, dst_channels: u32) -> Vec<i16> {
    let src = src_channels as usize;
    let dst = dst_channels as usize;
    if src == dst {
        return samples.to_vec();
    }

    let frames = samples.len() / src;
    let mut output = Vec::with_capacity(frames * dst);

    for group in samples.chunks_exact(src) {
        for c in 0..dst {
            if src > dst {
                let mut sum = 0i32;
                let mut count = 0i32;
                for (j, &sample) in group.iter().enumerate() {
                    if j % dst == c {
                        sum += i32::from(sample);
                        count += 1;
                    }
                }
                output.push((sum / count.max(1)) as i16);
            } else {
                output.push(group[c % src]);
            }
        }
    }

    output
}

fn resample_interleaved(
    samples: &[i16],
    channels: usize,
    from_rate: u32,
    to_rate: u32,
    output_len: usize,
) -> Vec<i16> {
    let input_len = samples.len() / channels;
    let mut output = vec![0i16; output_len * channels];
    if input_len == 0 {
        return output;
    }

    let step = f64::from(from_rate) / f64::from(to_rate);
    for i in 0..output_len {
        let src_pos = i as f64 * step;
        let src_idx = (src_pos.floor() as usize).min(input_len - 1);
        let next_idx = (src_idx + 1).min(input_len - 1);
        let frac = src_pos - src_idx as f64;

        for c in 0..channels {
            let s1 = f64::from(samples[src_idx * channels + c]);
            let s2 = f64::from(samples[next_idx * channels + c]);
            output[i * channels + c] = (s1 + (s2 - s1) * frac).round() as i16;
        }
    }

    output
}
