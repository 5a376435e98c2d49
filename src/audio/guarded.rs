//! Disposable mutex-protected buffer
//!
//! The real-time callback and the resample worker share each stream buffer
//! through this wrapper. Disposal empties the slot, so any access racing with
//! teardown sees `None` instead of a released buffer.

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::sync::Arc;

/// A value behind one mutex that can be released exactly once.
pub struct MutexGuardedBuffer<T> {
    slot: Mutex<Option<T>>,
}

/// Thread-safe handle to a guarded buffer
pub type SharedBuffer<T> = Arc<MutexGuardedBuffer<T>>;

impl<T> MutexGuardedBuffer<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(Some(value)),
        }
    }

    /// Convenience constructor for the shared form
    pub fn shared(value: T) -> SharedBuffer<T> {
        Arc::new(Self::new(value))
    }

    /// Lock the buffer; `None` once it has been disposed.
    pub fn lock(&self) -> Option<MappedMutexGuard<'_, T>> {
        MutexGuard::try_map(self.slot.lock(), |slot| slot.as_mut()).ok()
    }

    /// Run `f` with exclusive access; `None` once disposed.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        slot.as_mut().map(f)
    }

    /// Release the inner value. Returns `false` if already disposed.
    ///
    /// Waits for any holder of the lock to finish first.
    pub fn dispose(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_access_before_and_after_dispose() {
        let buffer = MutexGuardedBuffer::new(vec![1u8, 2, 3]);
        assert_eq!(buffer.with(|v| v.len()), Some(3));
        {
            let mut guard = buffer.lock().unwrap();
            guard.push(4);
        }
        assert_eq!(buffer.with(|v| v.clone()), Some(vec![1, 2, 3, 4]));

        assert!(buffer.dispose());
        assert!(buffer.is_disposed());
        assert!(buffer.lock().is_none());
        assert!(buffer.with(|v| v.len()).is_none());
        assert!(!buffer.dispose());
    }

    #[test]
    fn test_shared_across_threads() {
        let buffer = MutexGuardedBuffer::shared(0u64);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        buffer.with(|n| *n += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(buffer.with(|n| *n), Some(4000));
    }
}
