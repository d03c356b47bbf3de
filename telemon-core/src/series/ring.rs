//! Fixed-capacity ring buffer with lock-free snapshot reads.
//!
//! The buffer keeps its circular window behind an [`ArcSwap`]. A push builds
//! the next window (bounded by capacity) and swaps it in; readers load
//! whichever window is current and therefore always see either the state
//! before or after a push, never a mix of both. Readers never wait for the
//! writer and the writer never waits for readers.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Order in which multi-item reads are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleOrder {
    /// Arrival order, oldest entry first.
    #[default]
    OldestFirst,
    /// Reverse arrival order, most recent entry first.
    NewestFirst,
}

/// Immutable circular window.
struct Window<T> {
    slots: Box<[Option<Arc<T>>]>,
    /// Index the next push writes to.
    head: usize,
    len: usize,
}

impl<T> Window<T> {
    fn empty(capacity: usize) -> Self {
        Self { slots: vec![None; capacity].into_boxed_slice(), head: 0, len: 0 }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The window after appending `item`, evicting the oldest entry when full.
    fn pushed(&self, item: Arc<T>) -> Self {
        let capacity = self.capacity();
        let mut slots = self.slots.clone();
        slots[self.head] = Some(item);

        let len = (self.len + 1).min(capacity);
        debug_assert!(len <= capacity, "ring window exceeded its capacity");

        Self { slots, head: (self.head + 1) % capacity, len }
    }

    /// Slot index of the i-th oldest entry.
    fn index(&self, i: usize) -> usize {
        let capacity = self.capacity();
        (self.head + capacity - self.len + i) % capacity
    }

    fn get(&self, i: usize) -> Option<&Arc<T>> {
        if i >= self.len {
            return None;
        }
        self.slots[self.index(i)].as_ref()
    }
}

/// Bounded, append-only store of the most recent `capacity` items.
pub struct RingBuffer<T> {
    capacity: usize,
    window: ArcSwap<Window<T>>,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, window: ArcSwap::from_pointee(Window::empty(capacity)) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.load().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an item, evicting the oldest one if the buffer is full.
    pub fn push(&self, item: T) {
        self.push_shared(Arc::new(item));
    }

    /// Append an already shared item.
    pub fn push_shared(&self, item: Arc<T>) {
        self.window.rcu(|current| current.pushed(Arc::clone(&item)));
    }

    /// Point-in-time copy of every entry in arrival order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let window = self.window.load();
        (0..window.len).filter_map(|i| window.get(i).cloned()).collect()
    }

    /// The most recently pushed entry.
    pub fn latest(&self) -> Option<Arc<T>> {
        let window = self.window.load();
        match window.len {
            0 => None,
            len => window.get(len - 1).cloned(),
        }
    }

    /// The `n` most recent entries in the requested order.
    pub fn recent(&self, n: usize, order: SampleOrder) -> Vec<Arc<T>> {
        let window = self.window.load();
        let take = n.min(window.len);
        let skip = window.len - take;
        let mut items: Vec<Arc<T>> =
            (skip..window.len).filter_map(|i| window.get(i).cloned()).collect();
        if order == SampleOrder::NewestFirst {
            items.reverse();
        }
        items
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.window.store(Arc::new(Window::empty(self.capacity)));
    }
}

impl<T> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(items: Vec<Arc<u32>>) -> Vec<u32> {
        items.into_iter().map(|v| *v).collect()
    }

    #[test]
    fn test_empty_buffer() {
        let ring: RingBuffer<u32> = RingBuffer::new(3);
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
        assert!(ring.snapshot().is_empty());
        assert!(ring.recent(5, SampleOrder::NewestFirst).is_empty());
    }

    #[test]
    fn test_push_below_capacity() {
        let ring = RingBuffer::new(3);
        ring.push(1);
        ring.push(2);

        assert_eq!(ring.len(), 2);
        assert_eq!(values(ring.snapshot()), vec![1, 2]);
        assert_eq!(ring.latest().map(|v| *v), Some(2));
    }

    #[test]
    fn test_eviction_keeps_last_capacity() {
        let ring = RingBuffer::new(3);
        for i in 1..=7 {
            ring.push(i);
        }

        assert_eq!(ring.len(), 3);
        assert_eq!(values(ring.snapshot()), vec![5, 6, 7]);
        assert_eq!(ring.latest().map(|v| *v), Some(7));
    }

    #[test]
    fn test_recent_ordering() {
        let ring = RingBuffer::new(5);
        for i in 1..=8 {
            ring.push(i);
        }

        assert_eq!(values(ring.recent(3, SampleOrder::OldestFirst)), vec![6, 7, 8]);
        assert_eq!(values(ring.recent(3, SampleOrder::NewestFirst)), vec![8, 7, 6]);
        // Asking for more than is stored returns everything
        assert_eq!(values(ring.recent(50, SampleOrder::OldestFirst)), vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let ring = RingBuffer::new(0);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.capacity(), 1);
        assert_eq!(values(ring.snapshot()), vec![2]);
    }

    #[test]
    fn test_clear() {
        let ring = RingBuffer::new(2);
        ring.push(1);
        ring.clear();
        assert!(ring.is_empty());
        ring.push(9);
        assert_eq!(values(ring.snapshot()), vec![9]);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_pushes() {
        let ring = RingBuffer::new(2);
        ring.push(1);
        let before = ring.snapshot();
        ring.push(2);
        ring.push(3);

        assert_eq!(values(before), vec![1]);
        assert_eq!(values(ring.snapshot()), vec![2, 3]);
    }

    proptest! {
        #[test]
        fn prop_snapshot_is_last_capacity_in_order(
            capacity in 1usize..16,
            pushes in proptest::collection::vec(any::<u32>(), 0..64),
        ) {
            let ring = RingBuffer::new(capacity);
            for (i, value) in pushes.iter().enumerate() {
                ring.push(*value);
                prop_assert!(ring.len() <= capacity);
                prop_assert_eq!(ring.len(), (i + 1).min(capacity));
            }

            let expected: Vec<u32> =
                pushes.iter().skip(pushes.len().saturating_sub(capacity)).copied().collect();
            prop_assert_eq!(values(ring.snapshot()), expected);
        }
    }
}
