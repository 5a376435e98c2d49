//! Sample codecs
//!
//! Float <-> 16-bit PCM conversion used on every device callback, and the
//! WAV writer used to tee streams to disk for debugging.

pub mod pcm;
pub mod wav;

pub use pcm::{fixed_point_to_float, float_to_fixed_point};
pub use wav::WavWriter;
