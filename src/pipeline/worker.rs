//! Shared resample worker
//!
//! Remote tracks arrive at whatever rate and channel count the sender used,
//! while each playback sink wants its own format. Remixing is too slow for the
//! real-time thread, so every registered stream hands its frames to one
//! background thread which converts them and writes the result into that
//! stream's buffer.
//!
//! Lifecycle: the thread exists only while at least one stream is registered.
//! The first `register` spawns it, the last `unregister` cancels it and joins
//! it outside the registration lock.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::format::AudioFormat;
use crate::audio::frame::AudioFrame;
use crate::audio::guarded::SharedBuffer;
use crate::constants::WORKER_QUEUE_CAPACITY;
use crate::error::WorkerError;
use crate::pipeline::stream::StreamBuffer;
use crate::resample::{LinearRemixer, Remixer};

/// How long the worker waits on an empty queue before re-checking cancellation
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Identifier of one remote playback stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Worker statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Worker threads spawned over the lifetime of this worker
    pub threads_started: u64,
    /// Frames converted and written into a stream buffer
    pub frames_processed: u64,
    /// Queued frames whose stream was gone by the time they were processed
    pub frames_stale: u64,
    /// Frames for streams whose sink has not reported a format yet
    pub frames_awaiting_format: u64,
    /// `enqueue` calls refused because the stream is not registered
    pub frames_rejected: u64,
    /// Frames the remixer failed on
    pub remix_failures: u64,
    /// Frames dropped because the queue was full
    pub queue_full: u64,
}

struct WorkItem {
    stream: StreamId,
    /// Registration the frame was queued under
    generation: u64,
    frame: AudioFrame,
}

struct Registration {
    generation: u64,
    target: AudioFormat,
    buffer: SharedBuffer<StreamBuffer>,
}

/// A running worker thread and the means to stop it
struct Runtime {
    sender: Sender<WorkItem>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Runtime {
    fn stop(mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // Disconnects the queue so a blocked receive wakes up
        drop(self.sender);

        if let Some(handle) = self.handle.take() {
            // The thread itself may drop the last handle
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

#[derive(Default)]
struct WorkerState {
    registrations: HashMap<StreamId, Registration>,
    runtime: Option<Runtime>,
    next_generation: u64,
}

#[derive(Default)]
struct Counters {
    threads_started: AtomicU64,
    frames_processed: AtomicU64,
    frames_stale: AtomicU64,
    frames_awaiting_format: AtomicU64,
    frames_rejected: AtomicU64,
    remix_failures: AtomicU64,
    queue_full: AtomicU64,
}

struct Shared {
    remixer: Arc<dyn Remixer>,
    queue_capacity: usize,
    /// Never held while a stream buffer lock is taken
    state: Mutex<WorkerState>,
    counters: Counters,
}

/// Cloneable handle to the shared resample worker.
///
/// Dropping the last handle stops the thread.
#[derive(Clone)]
pub struct ResampleWorker {
    shared: Arc<Shared>,
}

impl ResampleWorker {
    pub fn new(remixer: Arc<dyn Remixer>, queue_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                remixer,
                queue_capacity: queue_capacity.max(1),
                state: Mutex::new(WorkerState::default()),
                counters: Counters::default(),
            }),
        }
    }

    /// Register a stream; spawns the worker thread if this is the first one.
    ///
    /// Registering an id again replaces its target format and buffer; frames
    /// queued under the earlier registration are discarded.
    pub fn register(
        &self,
        stream: StreamId,
        target: AudioFormat,
        buffer: SharedBuffer<StreamBuffer>,
    ) -> Result<(), WorkerError> {
        let mut state = self.shared.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        state.registrations.insert(
            stream,
            Registration {
                generation,
                target,
                buffer,
            },
        );

        if state.runtime.is_none() {
            match self.spawn() {
                Ok(runtime) => state.runtime = Some(runtime),
                Err(e) => {
                    state.registrations.remove(&stream);
                    return Err(e);
                }
            }
        }

        tracing::debug!("Registered {} for {}", stream, target);
        Ok(())
    }

    /// Remove a stream; stops the worker thread when none remain.
    ///
    /// Frames already queued for the stream are discarded when dequeued.
    pub fn unregister(&self, stream: StreamId) -> bool {
        let runtime = {
            let mut state = self.shared.state.lock();
            if state.registrations.remove(&stream).is_none() {
                return false;
            }
            if state.registrations.is_empty() {
                state.runtime.take()
            } else {
                None
            }
        };

        // Join outside the lock: the thread may be waiting on it
        if let Some(runtime) = runtime {
            runtime.stop();
            tracing::info!("Resample worker stopped");
        }

        tracing::debug!("Unregistered {}", stream);
        true
    }

    /// Queue a frame for conversion. Never blocks.
    ///
    /// Returns `false` if the stream is unknown or the queue is full.
    pub fn enqueue(&self, stream: StreamId, frame: AudioFrame) -> bool {
        let counters = &self.shared.counters;
        let state = self.shared.state.lock();

        let (runtime, generation) = match (state.runtime.as_ref(), state.registrations.get(&stream)) {
            (Some(runtime), Some(registration)) => (runtime, registration.generation),
            _ => {
                counters.frames_rejected.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        let item = WorkItem {
            stream,
            generation,
            frame,
        };
        match runtime.sender.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                counters.queue_full.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Resample queue full, dropping frame for {}", stream);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                counters.frames_rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Change the format a stream is converted to.
    pub fn set_target_format(&self, stream: StreamId, target: AudioFormat) -> Result<(), WorkerError> {
        let mut state = self.shared.state.lock();
        let registration = state
            .registrations
            .get_mut(&stream)
            .ok_or(WorkerError::NotRegistered(stream.0))?;

        if registration.target != target {
            tracing::debug!(
                "{} target format {} -> {}",
                stream,
                registration.target,
                target
            );
            registration.target = target;
        }
        Ok(())
    }

    /// Whether the worker thread currently exists
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().runtime.is_some()
    }

    /// Number of registered streams
    pub fn registrations(&self) -> usize {
        self.shared.state.lock().registrations.len()
    }

    pub fn stats(&self) -> WorkerStats {
        let c = &self.shared.counters;
        WorkerStats {
            threads_started: c.threads_started.load(Ordering::Relaxed),
            frames_processed: c.frames_processed.load(Ordering::Relaxed),
            frames_stale: c.frames_stale.load(Ordering::Relaxed),
            frames_awaiting_format: c.frames_awaiting_format.load(Ordering::Relaxed),
            frames_rejected: c.frames_rejected.load(Ordering::Relaxed),
            remix_failures: c.remix_failures.load(Ordering::Relaxed),
            queue_full: c.queue_full.load(Ordering::Relaxed),
        }
    }

    fn spawn(&self) -> Result<Runtime, WorkerError> {
        let (sender, receiver) = bounded::<WorkItem>(self.shared.queue_capacity);
        let cancelled = Arc::new(AtomicBool::new(false));
        let shared = Arc::downgrade(&self.shared);
        let cancelled_for_thread = cancelled.clone();

        let handle = thread::Builder::new()
            .name("resample-worker".into())
            .spawn(move || run(shared, receiver, cancelled_for_thread))
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        self.shared
            .counters
            .threads_started
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!("Resample worker started");

        Ok(Runtime {
            sender,
            cancelled,
            handle: Some(handle),
        })
    }
}

impl Default for ResampleWorker {
    fn default() -> Self {
        Self::new(Arc::new(LinearRemixer), WORKER_QUEUE_CAPACITY)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(runtime) = self.state.get_mut().runtime.take() {
            runtime.stop();
        }
    }
}

fn run(shared: Weak<Shared>, receiver: Receiver<WorkItem>, cancelled: Arc<AtomicBool>) {
    while !cancelled.load(Ordering::Acquire) {
        match receiver.recv_timeout(IDLE_POLL) {
            Ok(item) => {
                if cancelled.load(Ordering::Acquire) {
                    break;
                }
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.process(item);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!("Resample worker thread exiting");
}

impl Shared {
    fn process(&self, item: WorkItem) {
        let (target, buffer) = {
            let state = self.state.lock();
            match state.registrations.get(&item.stream) {
                Some(registration) if registration.generation == item.generation => {
                    (registration.target, registration.buffer.clone())
                }
                _ => {
                    self.counters.frames_stale.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!("Dropping stale frame for {}", item.stream);
                    return;
                }
            }
        };

        if !target.is_configured() {
            self.counters
                .frames_awaiting_format
                .fetch_add(1, Ordering::Relaxed);
            return;
        }

        // Remix with no lock held
        let converted = if item.frame.format() == target {
            None
        } else {
            match self.remixer.remix_and_resample(&item.frame, target) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    self.counters.remix_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Remix failed for {}: {}", item.stream, e);
                    return;
                }
            }
        };
        let converted = converted.as_ref().unwrap_or(&item.frame);

        match buffer.with(|b| b.write(&item.frame, converted)) {
            Some(()) => {
                self.counters
                    .frames_processed
                    .fetch_add(1, Ordering::Relaxed);
            }
            None => {
                // closed between lookup and write
                self.counters.frames_stale.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
