//! Float <-> signed 16-bit PCM conversion
//!
//! Scaling is by 32768 in both directions with saturation on the way in and
//! round-half-away-from-zero, which is what the APM and remote peers assume
//! for standard 16-bit PCM.

const S16_SCALE_FACTOR: f32 = 32768.0;
const S16_MAX_VALUE: f32 = 32767.0;
const S16_MIN_VALUE: f32 = -32768.0;

/// Converts a float sample to 16-bit PCM.
#[inline]
pub fn float_to_fixed_point(sample: f32) -> i16 {
    let scaled = (sample * S16_SCALE_FACTOR).clamp(S16_MIN_VALUE, S16_MAX_VALUE);
    let rounded = if scaled >= 0.0 {
        scaled + 0.5
    } else {
        scaled - 0.5
    };
    // `as` truncates toward zero and saturates, so 32767.5 stays 32767
    rounded as i16
}

/// Converts a 16-bit PCM sample to float in `[-1.0, 1.0)`.
#[inline]
pub fn fixed_point_to_float(sample: i16) -> f32 {
    f32::from(sample) / S16_SCALE_FACTOR
}

/// Encode `src` into `dst`, replacing its contents.
///
/// `dst` keeps its allocation between calls so the real-time thread does not
/// allocate once it has grown to the callback size.
pub fn encode_into(src: &[f32], dst: &mut Vec<i16>) {
    dst.clear();
    dst.extend(src.iter().map(|&s| float_to_fixed_point(s)));
}

/// Decode as many samples as fit into `dst`; returns the count written.
pub fn decode_into(src: &[i16], dst: &mut [f32]) -> usize {
    let n = src.len().min(dst.len());
    for (out, &sample) in dst[..n].iter_mut().zip(src) {
        *out = fixed_point_to_float(sample);
    }
    n
}
