//! Registry of remote playback streams
//!
//! Owns one [`StreamBuffer`] per remote track and keeps the resample worker's
//! registrations in step with it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::audio::format::AudioFormat;
use crate::audio::frame::AudioFrame;
use crate::audio::guarded::{MutexGuardedBuffer, SharedBuffer};
use crate::constants::DEFAULT_BUFFER_DURATION_MS;
use crate::error::{Error, Result, WorkerError};
use crate::pipeline::stream::{PlaybackStream, StreamBuffer};
use crate::pipeline::worker::{ResampleWorker, StreamId};

/// Map of open playback streams sharing one resample worker.
pub struct PlaybackStreams {
    worker: ResampleWorker,
    buffer_duration_ms: u32,
    streams: Mutex<HashMap<StreamId, SharedBuffer<StreamBuffer>>>,
    next_id: AtomicU64,
}

impl PlaybackStreams {
    pub fn new(worker: ResampleWorker, buffer_duration_ms: u32) -> Self {
        Self {
            worker,
            buffer_duration_ms,
            streams: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a stream converting to `sink_format`.
    ///
    /// Pass `AudioFormat::UNCONFIGURED` if the sink format is not known yet;
    /// the returned reader negotiates it on its first callback.
    pub fn open(&self, sink_format: AudioFormat) -> Result<PlaybackStream> {
        let id = StreamId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let buffer = MutexGuardedBuffer::shared(StreamBuffer::new(self.buffer_duration_ms));

        self.worker.register(id, sink_format, buffer.clone())?;
        self.streams.lock().insert(id, buffer.clone());

        tracing::info!("Opened {} ({} open)", id, self.len());
        Ok(PlaybackStream::new(id, buffer, self.worker.clone(), sink_format))
    }

    /// Close a stream: stop converting for it and release its buffer.
    pub fn close(&self, id: StreamId) -> bool {
        let Some(buffer) = self.streams.lock().remove(&id) else {
            return false;
        };

        self.worker.unregister(id);
        if let Some(Err(e)) = buffer.with(|b| b.stop_wav_tee()) {
            tracing::warn!("Failed to finalize WAV tee for {}: {}", id, e);
        }
        buffer.dispose();

        tracing::info!("Closed {}", id);
        true
    }

    /// Hand a frame received from the transport to the worker.
    pub fn deliver(&self, id: StreamId, frame: AudioFrame) -> bool {
        self.worker.enqueue(id, frame)
    }

    pub fn start_wav_tee(&self, id: StreamId, dir: &Path) -> Result<()> {
        let buffer = self.buffer(id)?;
        buffer
            .with(|b| b.start_wav_tee(dir, &id.to_string()))
            .ok_or(WorkerError::NotRegistered(id.0))??;
        tracing::info!("WAV tee for {} started in {}", id, dir.display());
        Ok(())
    }

    pub fn stop_wav_tee(&self, id: StreamId) -> Result<()> {
        let buffer = self.buffer(id)?;
        buffer
            .with(|b| b.stop_wav_tee())
            .ok_or(WorkerError::NotRegistered(id.0))??;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn worker(&self) -> &ResampleWorker {
        &self.worker
    }

    /// Close every stream.
    pub fn close_all(&self) {
        let ids: Vec<StreamId> = self.streams.lock().keys().copied().collect();
        for id in ids {
            self.close(id);
        }
    }

    fn buffer(&self, id: StreamId) -> Result<SharedBuffer<StreamBuffer>> {
        self.streams
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::from(WorkerError::NotRegistered(id.0)))
    }
}

impl Default for PlaybackStreams {
    fn default() -> Self {
        Self::new(ResampleWorker::default(), DEFAULT_BUFFER_DURATION_MS)
    }
}

impl Drop for PlaybackStreams {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close() {
        let streams = PlaybackStreams::default();
        let a = streams.open(AudioFormat::new(2, 48000)).unwrap();
        let b = streams.open(AudioFormat::new(2, 48000)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(streams.len(), 2);
        assert_eq!(streams.worker().registrations(), 2);
        assert!(streams.worker().is_running());

        assert!(streams.close(a.id()));
        assert!(!streams.close(a.id()));
        assert!(streams.close(b.id()));
        assert!(streams.is_empty());
        assert!(!streams.worker().is_running());
    }

    #[test]
    fn test_deliver_after_close_is_refused() {
        let streams = PlaybackStreams::default();
        let stream = streams.open(AudioFormat::new(1, 48000)).unwrap();
        streams.close(stream.id());

        let frame = AudioFrame::silent(AudioFormat::new(1, 48000), 480);
        assert!(!streams.deliver(stream.id(), frame));
    }

    #[test]
    fn test_wav_tee_unknown_stream() {
        let streams = PlaybackStreams::default();
        let err = streams
            .start_wav_tee(StreamId(42), &std::env::temp_dir())
            .unwrap_err();
        assert!(matches!(err, Error::Worker(WorkerError::NotRegistered(42))));
    }
}
