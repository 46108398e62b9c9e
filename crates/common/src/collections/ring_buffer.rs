//! A fixed-capacity FIFO buffer that evicts its oldest entry on overflow.
//!
//! [`RingBuffer`] keeps items in insertion order and never grows past the
//! capacity it was created with. Pushing into a full buffer discards the oldest
//! element first and hands it back to the caller, so eviction is strict FIFO.
//!
//! # Complexity
//! - `push`, `pop`, `len`, `is_full`, `oldest`, `newest` are **O(1)**.
//! - `iter` walks from oldest to newest.

use std::collections::VecDeque;

/// A fixed-capacity circular buffer storing elements in first-in-first-out
/// order.
///
/// # Examples
///
/// ```rust
/// use catalog_common::collections::RingBuffer;
///
/// let mut buffer = RingBuffer::new(2);
/// assert_eq!(buffer.push("a"), None);
/// assert_eq!(buffer.push("b"), None);
/// assert_eq!(buffer.push("c"), Some("a"));
/// assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec!["b", "c"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a new buffer with the provided capacity.
    ///
    /// A capacity of zero is clamped to `1`.
    #[inline]
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { buf: VecDeque::with_capacity(capacity), capacity }
    }

    /// Appends an item, returning the evicted oldest item when the buffer was
    /// already full.
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.buf.pop_front() } else { None };
        self.buf.push_back(item);
        evicted
    }

    /// Removes and returns the oldest item.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    /// Oldest item still retained.
    #[inline]
    #[must_use]
    pub fn oldest(&self) -> Option<&T> {
        self.buf.front()
    }

    /// Most recently pushed item.
    #[inline]
    #[must_use]
    pub fn newest(&self) -> Option<&T> {
        self.buf.back()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns `true` when the next push will evict.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes all elements, leaving the capacity unchanged.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Iterates from oldest to newest.
    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.buf.iter()
    }
}

impl<T> Extend<T> for RingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
