//! Power-of-two ring buffer over plain values with overwrite-on-full
//!
//! Unlike [`ByteRingBuffer`](crate::audio::ring_buffer::ByteRingBuffer) this
//! buffer never refuses data: when an enqueue does not fit, the oldest unread
//! elements are evicted. Readers therefore get at most the freshest
//! `capacity` elements, never a lossless queue.

/// Fixed-capacity circular buffer with bitmask indexing.
pub struct TypedRingBuffer<T> {
    buffer: Box<[T]>,
    /// Contiguous copy target for `try_dequeue`
    scratch: Box<[T]>,
    /// Capacity (always power of 2)
    capacity: usize,
    /// Mask for fast modulo
    mask: usize,
    /// Monotonic write cursor
    head: usize,
    /// Monotonic read cursor
    tail: usize,
    /// Elements evicted by overwrite
    overwritten: u64,
}

impl<T: Copy + Default> TypedRingBuffer<T> {
    /// Create a ring buffer; `capacity` is rounded up to the next power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();

        Self {
            buffer: vec![T::default(); capacity].into_boxed_slice(),
            scratch: vec![T::default(); capacity].into_boxed_slice(),
            capacity,
            mask: capacity - 1,
            head: 0,
            tail: 0,
            overwritten: 0,
        }
    }

    /// Append `data`, evicting the oldest unread elements if it does not fit.
    pub fn enqueue(&mut self, data: &[T]) {
        if data.is_empty() {
            return;
        }

        let free = self.capacity - self.len();
        let to_overwrite = data.len().saturating_sub(free);

        // Only the last `capacity` elements of an oversized span can survive
        let kept = if data.len() > self.capacity {
            &data[data.len() - self.capacity..]
        } else {
            data
        };
        let start = self.head.wrapping_add(data.len() - kept.len());

        let index = start & self.mask;
        let first = kept.len().min(self.capacity - index);
        let second = kept.len() - first;

        self.buffer[index..index + first].copy_from_slice(&kept[..first]);
        if second > 0 {
            self.buffer[..second].copy_from_slice(&kept[first..]);
        }

        self.head = self.head.wrapping_add(data.len());
        if to_overwrite > 0 {
            self.tail = self.tail.wrapping_add(to_overwrite);
            self.overwritten += to_overwrite as u64;
        }
    }

    /// Dequeue exactly `length` elements.
    ///
    /// Returns `None` without consuming anything if fewer are buffered. The
    /// returned slice is valid until the next call.
    pub fn try_dequeue(&mut self, length: usize) -> Option<&[T]> {
        if self.len() < length {
            return None;
        }

        let index = self.tail & self.mask;
        let first = length.min(self.capacity - index);
        let second = length - first;

        self.scratch[..first].copy_from_slice(&self.buffer[index..index + first]);
        if second > 0 {
            self.scratch[first..length].copy_from_slice(&self.buffer[..second]);
        }

        self.tail = self.tail.wrapping_add(length);
        Some(&self.scratch[..length])
    }

    /// Number of buffered elements
    pub fn len(&self) -> usize {
        self.head.wrapping_sub(self.tail)
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots before the next enqueue starts overwriting
    pub fn available_write(&self) -> usize {
        self.capacity - self.len()
    }

    /// Total elements evicted by overwrite since creation
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_up() {
        assert_eq!(TypedRingBuffer::<i16>::new(0).capacity(), 1);
        assert_eq!(TypedRingBuffer::<i16>::new(1).capacity(), 1);
        assert_eq!(TypedRingBuffer::<i16>::new(5).capacity(), 8);
        assert_eq!(TypedRingBuffer::<i16>::new(9600).capacity(), 16384);
        assert_eq!(TypedRingBuffer::<i16>::new(4096).capacity(), 4096);
    }

    #[test]
    fn test_enqueue_dequeue() {
        let mut ring = TypedRingBuffer::<i16>::new(8);
        ring.enqueue(&[1, 2, 3]);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.try_dequeue(2), Some(&[1, 2][..]));
        assert_eq!(ring.try_dequeue(1), Some(&[3][..]));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_dequeue_requires_full_length() {
        let mut ring = TypedRingBuffer::<i16>::new(8);
        ring.enqueue(&[1, 2, 3]);
        assert!(ring.try_dequeue(4).is_none());
        // nothing consumed by the failed attempt
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_overwrite_drops_oldest() {
        let mut ring = TypedRingBuffer::<i16>::new(4);
        ring.enqueue(&[1, 2, 3]);
        ring.enqueue(&[4, 5, 6]);

        assert!(ring.is_full());
        assert_eq!(ring.overwritten(), 2);
        assert_eq!(ring.try_dequeue(4), Some(&[3, 4, 5, 6][..]));
    }

    #[test]
    fn test_oversized_span_keeps_tail() {
        let mut ring = TypedRingBuffer::<i16>::new(4);
        ring.enqueue(&[9, 9]);
        ring.enqueue(&[1, 2, 3, 4, 5, 6, 7]);

        assert_eq!(ring.len(), 4);
        assert_eq!(ring.overwritten(), 5);
        assert_eq!(ring.try_dequeue(4), Some(&[4, 5, 6, 7][..]));
    }

    #[test]
    fn test_dequeue_across_wrap_is_contiguous() {
        let mut ring = TypedRingBuffer::<u8>::new(8);
        ring.enqueue(&[0; 6]);
        ring.try_dequeue(6);
        ring.enqueue(&[1, 2, 3, 4, 5]);

        assert_eq!(ring.try_dequeue(5), Some(&[1, 2, 3, 4, 5][..]));
    }
}
