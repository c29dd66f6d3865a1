//! Fixed-capacity FIFO between the transport (producer) and the lesson loop
//! (consumer)
//!
//! Single producer, single consumer, both on the polling task, so no locking.
//! An explicit element count keeps full and empty distinct and lets every slot
//! hold a record. When full, the incoming record is rejected (drop-newest) and
//! counted.

/// Bounded FIFO of `N` copyable records
#[derive(Debug, Clone)]
pub struct EventRing<T, const N: usize> {
    slots: [T; N],
    /// Next slot to read
    read: usize,
    /// Next slot to write
    write: usize,
    len: usize,
    /// Pushes rejected because the ring was full (never reset)
    dropped: u64,
}

impl<T: Copy + Default, const N: usize> EventRing<T, N> {
    const NON_ZERO: () = assert!(N > 0, "EventRing capacity must be at least one record");

    /// Create an empty ring
    pub fn new() -> Self {
        let () = Self::NON_ZERO;
        Self {
            slots: [T::default(); N],
            read: 0,
            write: 0,
            len: 0,
            dropped: 0,
        }
    }

    /// Append a record. Returns `false` and drops the record if the ring is full.
    pub fn push(&mut self, record: T) -> bool {
        if self.len == N {
            self.dropped += 1;
            return false;
        }

        self.slots[self.write] = record;
        self.write = (self.write + 1) % N;
        self.len += 1;
        true
    }

    /// Remove the oldest record
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        let record = self.slots[self.read];
        self.read = (self.read + 1) % N;
        self.len -= 1;
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Total number of records rejected since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Discard all queued records; the drop counter is kept
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.len = 0;
    }
}

impl<T: Copy + Default, const N: usize> Default for EventRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fifo_order() {
        let mut ring: EventRing<u32, 8> = EventRing::new();
        for i in 0..5 {
            assert!(ring.push(i));
        }
        assert_eq!(ring.len(), 5);

        let popped: Vec<u32> = std::iter::from_fn(|| ring.pop()).collect();
        assert_eq!(popped, vec![0, 1, 2, 3, 4]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_drop_newest_when_full() {
        let mut ring: EventRing<u32, 4> = EventRing::new();
        for i in 0..4 {
            assert!(ring.push(i));
        }
        assert!(ring.is_full());

        assert!(!ring.push(99));
        assert_eq!(ring.dropped(), 1);

        let popped: Vec<u32> = std::iter::from_fn(|| ring.pop()).collect();
        assert_eq!(popped, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_capacity_one() {
        let mut ring: EventRing<u8, 1> = EventRing::new();
        assert!(ring.push(7));
        assert!(!ring.push(8));
        assert_eq!(ring.pop(), Some(7));
        assert_eq!(ring.pop(), None);
        assert!(ring.push(9));
        assert_eq!(ring.pop(), Some(9));
        assert_eq!(ring.dropped(), 1);
    }

    #[test]
    fn test_wraps_around() {
        let mut ring: EventRing<u32, 3> = EventRing::new();
        for round in 0..10u32 {
            assert!(ring.push(round * 2));
            assert!(ring.push(round * 2 + 1));
            assert_eq!(ring.pop(), Some(round * 2));
            assert_eq!(ring.pop(), Some(round * 2 + 1));
        }
        assert!(ring.is_empty());
        assert_eq!(ring.dropped(), 0);
    }

    #[test]
    fn test_clear_keeps_drop_counter() {
        let mut ring: EventRing<u32, 2> = EventRing::new();
        ring.push(1);
        ring.push(2);
        ring.push(3);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.dropped(), 1);
        assert!(ring.push(4));
        assert_eq!(ring.pop(), Some(4));
    }

    proptest! {
        #[test]
        fn prop_fifo_up_to_capacity(values in proptest::collection::vec(any::<u32>(), 0..=16)) {
            let mut ring: EventRing<u32, 16> = EventRing::new();
            for v in &values {
                prop_assert!(ring.push(*v));
            }
            let popped: Vec<u32> = std::iter::from_fn(|| ring.pop()).collect();
            prop_assert_eq!(popped, values);
        }

        #[test]
        fn prop_overflow_keeps_oldest(values in proptest::collection::vec(any::<u32>(), 9..40)) {
            let mut ring: EventRing<u32, 8> = EventRing::new();
            let accepted = values.iter().filter(|v| ring.push(**v)).count();
            prop_assert_eq!(accepted, 8);
            prop_assert_eq!(ring.dropped(), (values.len() - 8) as u64);
            let popped: Vec<u32> = std::iter::from_fn(|| ring.pop()).collect();
            prop_assert_eq!(&popped[..], &values[..8]);
        }

        #[test]
        fn prop_interleaved_matches_queue(
            ops in proptest::collection::vec(any::<Option<u8>>(), 0..200)
        ) {
            let mut ring: EventRing<u8, 5> = EventRing::new();
            let mut model = std::collections::VecDeque::new();
            for op in ops {
                match op {
                    Some(v) => {
                        let accepted = ring.push(v);
                        prop_assert_eq!(accepted, model.len() < 5);
                        if accepted {
                            model.push_back(v);
                        }
                    }
                    None => prop_assert_eq!(ring.pop(), model.pop_front()),
                }
                prop_assert_eq!(ring.len(), model.len());
            }
        }
    }
}
