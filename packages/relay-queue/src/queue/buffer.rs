// growable buffer owned by the relay.
//
// this is a plain, not-itself-concurrent queue. the relay is its only user, which is why it needs
// no synchronization. the interesting part is the allocation policy:
//
// - storage is a Vec<Option<T>> plus a head index. popping takes the front slot (leaving None in
//   it) and advances head, so a delivered element is released immediately rather than whenever
//   the slot happens to be overwritten.
// - the "residual capacity" is the capacity not yet consumed by head. once the buffer is empty and
//   the residual capacity falls below REALLOC_THRESHOLD, the whole allocation is replaced by a
//   fresh preallocated one.
// - when a push finds the storage full and there is a consumed prefix, the live elements move into
//   a fresh allocation sized for them, so the allocation left behind by a burst is released rather
//   than reused forever.

use std::cmp::max;


// preallocated capacity in elements.
pub(crate) const PREALLOC_CAP: usize = 1 << 10;

// residual capacity below which an empty buffer is reallocated.
pub(crate) const REALLOC_THRESHOLD: usize = 1 << 5;


// growable FIFO buffer.
pub(crate) struct RelayBuffer<T> {
    // invariant: slots[..head] are all None, slots[head..] are all Some.
    slots: Vec<Option<T>>,
    head: usize,
}

impl<T> RelayBuffer<T> {
    // construct empty with the preallocated capacity.
    pub(crate) fn new() -> Self {
        RelayBuffer {
            slots: Vec::with_capacity(PREALLOC_CAP),
            head: 0,
        }
    }

    // number of buffered elements.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.head
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // capacity remaining past the consumed prefix.
    pub(crate) fn residual_cap(&self) -> usize {
        self.slots.capacity() - self.head
    }

    // push to back.
    pub(crate) fn push_back(&mut self, elem: T) {
        if self.slots.len() == self.slots.capacity() && self.head > 0 {
            // move the live elements to a fresh allocation instead of growing the old one
            let live = self.len();
            let mut slots = Vec::with_capacity(max(PREALLOC_CAP, live * 2));
            slots.extend(self.slots.drain(self.head..));
            self.slots = slots;
            self.head = 0;
        }
        self.slots.push(Some(elem));
    }

    // pop from front, clearing the slot it occupied.
    pub(crate) fn pop_front(&mut self) -> Option<T> {
        let elem = self.slots.get_mut(self.head)?.take();
        debug_assert!(elem.is_some(), "RelayBuffer slot past head was empty (internal bug)");
        self.head += 1;
        elem
    }

    // replace with a fresh preallocated buffer if empty and the residual capacity is too small.
    //
    // returns whether it reallocated.
    pub(crate) fn maybe_realloc(&mut self) -> bool {
        if self.is_empty() && self.residual_cap() < REALLOC_THRESHOLD {
            *self = Self::new();
            true
        } else {
            false
        }
    }

    // remove all elements, returning them front to back.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item=T> + '_ {
        let head = self.head;
        self.head = 0;
        self.slots.drain(head..).flatten()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_pcg::Pcg32;
    use std::{
        collections::VecDeque,
        sync::Arc,
    };

    fn new_rng() -> impl Rng {
        Pcg32::from_seed(0xdeadbeefdeadbeefdeadbeefdeadbeefu128.to_le_bytes())
    }

    #[test]
    fn starts_preallocated() {
        let buf = RelayBuffer::<u64>::new();
        assert!(buf.is_empty());
        assert!(buf.residual_cap() >= PREALLOC_CAP);
    }

    #[test]
    fn equivalent_to_vec_deque() {
        let mut rng = new_rng();

        for outer in 0..20 {
            let mut queue_1 = VecDeque::new();
            let mut queue_2 = RelayBuffer::new();
            // vary the push bias so that both bursts and drains happen
            let push_bias = 40 + outer * 2;
            for i in 0u32..20_000 {
                if rng.gen_ratio(push_bias, 80) {
                    queue_1.push_back(i);
                    queue_2.push_back(i);
                } else {
                    assert_eq!(queue_2.pop_front(), queue_1.pop_front());
                    queue_2.maybe_realloc();
                }
                assert_eq!(queue_1.len(), queue_2.len());
                assert_eq!(queue_1.is_empty(), queue_2.is_empty());
            }
            assert!(queue_2.drain().eq(queue_1.drain(..)));
            assert!(queue_2.is_empty());
        }
    }

    #[test]
    fn pop_releases_element() {
        let marker = Arc::new(());
        let mut buf = RelayBuffer::new();
        buf.push_back(Arc::clone(&marker));
        buf.push_back(Arc::clone(&marker));
        assert_eq!(Arc::strong_count(&marker), 3);
        drop(buf.pop_front());
        // the storage slot must not keep the popped element alive
        assert_eq!(Arc::strong_count(&marker), 2);
        drop(buf);
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    fn reallocates_when_residual_capacity_is_small() {
        let mut buf = RelayBuffer::new();
        let cap = buf.residual_cap();
        for i in 0..cap - REALLOC_THRESHOLD + 1 {
            buf.push_back(i);
        }
        while buf.pop_front().is_some() {}
        assert!(buf.residual_cap() < REALLOC_THRESHOLD);
        assert!(buf.maybe_realloc());
        assert!(buf.residual_cap() >= PREALLOC_CAP);
    }

    #[test]
    fn keeps_buffer_with_room_left() {
        let mut buf = RelayBuffer::new();
        for i in 0..10 {
            buf.push_back(i);
        }
        // not empty: never reallocated
        assert!(!buf.maybe_realloc());
        while buf.pop_front().is_some() {}
        assert!(!buf.maybe_realloc());
        assert_eq!(buf.residual_cap(), buf.slots.capacity() - 10);
    }

    #[test]
    fn burst_allocation_is_released() {
        let mut buf = RelayBuffer::new();
        for i in 0..100_000 {
            buf.push_back(i);
        }
        let burst_cap = buf.slots.capacity();
        assert!(burst_cap >= 100_000);
        for i in 0..99_990 {
            assert_eq!(buf.pop_front(), Some(i));
        }
        // fill the remaining capacity so the next push has to move the live elements
        let mut next = 100_000;
        while buf.slots.len() < buf.slots.capacity() {
            buf.push_back(next);
            next += 1;
        }
        buf.push_back(next);
        assert_eq!(buf.head, 0);
        assert!(buf.slots.capacity() < burst_cap);
        assert_eq!(buf.pop_front(), Some(99_990));
    }

    #[test]
    fn drain_yields_remaining_in_order() {
        let mut buf = RelayBuffer::new();
        for i in 0..5 {
            buf.push_back(i);
        }
        assert_eq!(buf.pop_front(), Some(0));
        assert_eq!(buf.drain().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(buf.is_empty());
        assert_eq!(buf.pop_front(), None);
    }
}
