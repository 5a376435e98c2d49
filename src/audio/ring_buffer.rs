//! Fixed-size circular byte buffer
//!
//! The lowest-level storage primitive of the pipeline. Writes never grow the
//! buffer: whatever does not fit is refused and the caller learns how much was
//! taken from the return value. Reads hand back at most what is buffered.

/// Circular byte buffer with independent read and write cursors.
///
/// Not synchronized; share it through a [`MutexGuardedBuffer`].
///
/// [`MutexGuardedBuffer`]: crate::audio::guarded::MutexGuardedBuffer
pub struct ByteRingBuffer {
    buffer: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
    /// Bytes currently readable
    len: usize,
    /// Bytes refused by `write` because the buffer was full
    truncated: u64,
}

impl ByteRingBuffer {
    /// Create a new ring buffer holding up to `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
            len: 0,
            truncated: 0,
        }
    }

    /// Copy as many bytes of `data` as fit into free space.
    ///
    /// Returns the number of bytes actually written; the rest is dropped.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let write = data.len().min(self.available_write());
        self.truncated += (data.len() - write) as u64;
        if write == 0 {
            return 0;
        }

        let capacity = self.buffer.len();
        let margin = capacity - self.write_pos;

        if write > margin {
            // Tail segment, then wrap to the head
            self.buffer[self.write_pos..].copy_from_slice(&data[..margin]);
            self.buffer[..write - margin].copy_from_slice(&data[margin..write]);
        } else {
            self.buffer[self.write_pos..self.write_pos + write].copy_from_slice(&data[..write]);
        }

        self.write_pos = (self.write_pos + write) % capacity;
        self.len += write;
        write
    }

    /// Copy up to `destination.len()` buffered bytes out, oldest first.
    ///
    /// Returns the number of bytes copied, which may be less than the
    /// destination length.
    pub fn read(&mut self, destination: &mut [u8]) -> usize {
        let read = destination.len().min(self.len);
        if read == 0 {
            return 0;
        }

        let capacity = self.buffer.len();
        let margin = capacity - self.read_pos;

        if read > margin {
            destination[..margin].copy_from_slice(&self.buffer[self.read_pos..]);
            destination[margin..read].copy_from_slice(&self.buffer[..read - margin]);
        } else {
            destination[..read].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + read]);
        }

        self.read_pos = (self.read_pos + read) % capacity;
        self.len -= read;
        read
    }

    /// Bytes available to read
    pub fn available_read(&self) -> usize {
        self.len
    }

    /// Bytes that can be written before truncation kicks in
    pub fn available_write(&self) -> usize {
        self.buffer.len() - self.len
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total bytes refused by `write` since creation
    pub fn truncated_bytes(&self) -> u64 {
        self.truncated
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut ring = ByteRingBuffer::new(8);
        assert_eq!(ring.write(&[1, 2, 3]), 3);
        assert_eq!(ring.available_read(), 3);
        assert_eq!(ring.available_write(), 5);

        let mut out = [0u8; 3];
        assert_eq!(ring.read(&mut out), 3);
        assert_eq!(out, [1, 2, 3]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_write_truncates_when_full() {
        let mut ring = ByteRingBuffer::new(4);
        assert_eq!(ring.write(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(ring.truncated_bytes(), 2);
        assert_eq!(ring.write(&[7]), 0);
        assert_eq!(ring.truncated_bytes(), 3);

        let mut out = [0u8; 4];
        ring.read(&mut out);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_read_returns_partial_count() {
        let mut ring = ByteRingBuffer::new(8);
        ring.write(&[9, 8]);

        let mut out = [0u8; 5];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(&out[..2], &[9, 8]);
        assert_eq!(&out[2..], &[0, 0, 0]);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut ring = ByteRingBuffer::new(5);
        ring.write(&[1, 2, 3, 4]);
        let mut out = [0u8; 3];
        ring.read(&mut out);

        // write cursor at 4, read cursor at 3: next write wraps
        assert_eq!(ring.write(&[5, 6, 7, 8]), 4);
        assert_eq!(ring.available_read(), 5);
        assert_eq!(ring.available_write(), 0);

        let mut out = [0u8; 5];
        assert_eq!(ring.read(&mut out), 5);
        assert_eq!(out, [4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_capacity_invariant_holds() {
        let mut ring = ByteRingBuffer::new(7);
        let mut out = [0u8; 3];
        for round in 0..20u8 {
            ring.write(&[round; 4]);
            assert_eq!(ring.available_read() + ring.available_write(), ring.capacity());
            ring.read(&mut out);
            assert_eq!(ring.available_read() + ring.available_write(), ring.capacity());
        }
    }

    #[test]
    fn test_zero_capacity_is_inert() {
        let mut ring = ByteRingBuffer::new(0);
        assert_eq!(ring.write(&[1, 2]), 0);
        let mut out = [0u8; 2];
        assert_eq!(ring.read(&mut out), 0);
    }
}
