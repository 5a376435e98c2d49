//! WAV tee writer for debugging the pipeline.
//!
//! Mirrors raw 16-bit PCM into a RIFF/WAVE stream. A zeroed 44-byte header is
//! reserved on the first write and patched with the real sizes when the writer
//! is finalized (explicitly, or on drop as a best effort).

use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::audio::format::AudioFormat;
use crate::audio::frame::AudioFrame;
use crate::constants::BYTES_PER_SAMPLE;
use crate::error::CodecError;

/// Size of the WAV header in bytes (RIFF + fmt + data chunk headers).
pub const WAV_HEADER_SIZE: usize = 44;

/// Size of the fmt chunk data (16 bytes for PCM).
const WAV_FMT_CHUNK_SIZE: u32 = 16;

/// Audio format code for PCM (uncompressed).
const WAV_FORMAT_PCM: u16 = 1;

const WAV_BITS_PER_SAMPLE: u16 = 16;

/// Streams PCM frames into a seekable writer as a WAV file.
pub struct WavWriter<W: Write + Seek> {
    writer: Option<W>,
    /// Locked by the first write
    format: Option<AudioFormat>,
    data_bytes: u64,
}

impl WavWriter<BufWriter<File>> {
    /// Create (or truncate) a WAV file, creating missing parent directories.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            format: None,
            data_bytes: 0,
        }
    }

    pub fn write_frame(&mut self, frame: &AudioFrame) -> Result<(), CodecError> {
        self.write(frame.samples(), frame.format())
    }

    /// Append interleaved samples; every call must use the same format.
    pub fn write(&mut self, samples: &[i16], format: AudioFormat) -> Result<(), CodecError> {
        if !format.is_configured() {
            return Err(CodecError::UnconfiguredFormat);
        }
        let writer = self.writer.as_mut().ok_or(CodecError::Finalized)?;

        match self.format {
            None => {
                writer.write_all(&[0u8; WAV_HEADER_SIZE])?;
                self.format = Some(format);
            }
            Some(locked) if locked != format => {
                return Err(CodecError::FormatChanged {
                    expected: locked.to_string(),
                    actual: format.to_string(),
                });
            }
            Some(_) => {}
        }

        for sample in samples {
            writer.write_all(&sample.to_le_bytes())?;
        }
        self.data_bytes += (samples.len() * BYTES_PER_SAMPLE) as u64;
        Ok(())
    }

    /// Bytes of PCM written so far (excluding the header)
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Patch the header and hand back the underlying writer.
    pub fn finalize(mut self) -> Result<W, CodecError> {
        self.patch_header()?;
        self.writer.take().ok_or(CodecError::Finalized)
    }

    fn patch_header(&mut self) -> Result<(), CodecError> {
        let writer = self.writer.as_mut().ok_or(CodecError::Finalized)?;
        let Some(format) = self.format else {
            // nothing was ever written, leave the stream empty
            writer.flush()?;
            return Ok(());
        };

        let data_size = u32::try_from(self.data_bytes).unwrap_or(u32::MAX);
        writer.seek(SeekFrom::Start(0))?;
        write_header(writer, format, data_size)?;
        writer.seek(SeekFrom::End(0))?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> Drop for WavWriter<W> {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.patch_header() {
                tracing::warn!("Failed to finalize WAV header: {}", e);
            }
        }
    }
}

fn write_header<W: Write>(writer: &mut W, format: AudioFormat, data_size: u32) -> std::io::Result<()> {
    let channels = format.channels as u16;
    let bytes_per_sample = WAV_BITS_PER_SAMPLE / 8;
    let byte_rate = format.sample_rate * u32::from(channels) * u32::from(bytes_per_sample);
    let block_align = channels * bytes_per_sample;
    let riff_size = (WAV_HEADER_SIZE as u32 - 8).saturating_add(data_size);

    // RIFF container header
    writer.write_all(b"RIFF")?;
    writer.write_all(&riff_size.to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    // fmt subchunk
    writer.write_all(b"fmt ")?;
    writer.write_all(&WAV_FMT_CHUNK_SIZE.to_le_bytes())?;
    writer.write_all(&WAV_FORMAT_PCM.to_le_bytes())?;
    writer.write_all(&channels.to_le_bytes())?;
    writer.write_all(&format.sample_rate.to_le_bytes())?;
    writer.write_all(&byte_rate.to_le_bytes())?;
    writer.write_all(&block_align.to_le_bytes())?;
    writer.write_all(&WAV_BITS_PER_SAMPLE.to_le_bytes())?;

    // data subchunk header
    writer.write_all(b"data")?;
    writer.write_all(&data_size.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn test_header_patched_on_finalize() {
        let mut wav = WavWriter::new(Cursor::new(Vec::new()));
        let format = AudioFormat::new(2, 48000);
        wav.write(&[1, -1, 2, -2], format).unwrap();
        wav.write(&[3, -3], format).unwrap();

        let bytes = wav.finalize().unwrap().into_inner();
        assert_eq!(bytes.len(), WAV_HEADER_SIZE + 12);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), 36 + 12);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 22), 2);
        assert_eq!(u32_at(&bytes, 24), 48000);
        assert_eq!(u32_at(&bytes, 28), 48000 * 2 * 2);
        assert_eq!(u16_at(&bytes, 32), 4);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 12);
        assert_eq!(u16_at(&bytes, 44) as i16, 1);
        assert_eq!(u16_at(&bytes, 46) as i16, -1);
    }

    #[test]
    fn test_format_change_is_rejected() {
        let mut wav = WavWriter::new(Cursor::new(Vec::new()));
        wav.write(&[0; 4], AudioFormat::new(1, 48000)).unwrap();

        let err = wav.write(&[0; 4], AudioFormat::new(2, 48000)).unwrap_err();
        assert!(matches!(err, CodecError::FormatChanged { .. }));
        assert_eq!(wav.data_bytes(), 8);
    }

    #[test]
    fn test_empty_writer_stays_empty() {
        let wav = WavWriter::new(Cursor::new(Vec::new()));
        let bytes = wav.finalize().unwrap().into_inner();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_unconfigured_format_rejected() {
        let mut wav = WavWriter::new(Cursor::new(Vec::new()));
        assert!(matches!(
            wav.write(&[1], AudioFormat::UNCONFIGURED),
            Err(CodecError::UnconfiguredFormat)
        ));
    }

    #[test]
    fn test_create_writes_file_on_drop() {
        let dir = std::env::temp_dir().join(format!("wav-tee-test-{}", std::process::id()));
        let path = dir.join("nested").join("drop.wav");

        {
            let mut wav = WavWriter::create(&path).unwrap();
            wav.write_frame(&AudioFrame::silent(AudioFormat::new(1, 16000), 160))
                .unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), WAV_HEADER_SIZE + 320);
        assert_eq!(u32_at(&bytes, 40), 320);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
