//! Bounded history buffer
//!
//! Fixed-capacity store for time-ordered samples. Once full, each push
//! overwrites the oldest entry.

use std::collections::VecDeque;

/// Ring store holding at most `capacity` items in insertion order
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    /// A capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, evicting the oldest when full
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

impl<T: Clone> HistoryBuffer<T> {
    /// The `n` most recently inserted items, oldest first
    pub fn get_recent(&self, n: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).cloned().collect()
    }

    /// Every stored item, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_overflow_keeps_last_capacity_items() {
        let capacity = 10;
        let mut buffer = HistoryBuffer::new(capacity);

        for i in 0..capacity + 5 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), capacity);
        assert_eq!(buffer.to_vec(), (5..15).collect::<Vec<_>>());
        assert_eq!(buffer.latest(), Some(&14));
    }

    #[test]
    fn test_get_recent_returns_newest_in_insertion_order() {
        let mut buffer = HistoryBuffer::new(4);
        for i in 1..=6 {
            buffer.push(i);
        }

        assert_eq!(buffer.get_recent(2), vec![5, 6]);
        assert_eq!(buffer.get_recent(10), vec![3, 4, 5, 6]);
        assert!(buffer.get_recent(0).is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = HistoryBuffer::new(0);
        buffer.push("a");
        buffer.push("b");

        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.to_vec(), vec!["b"]);
    }

    proptest! {
        #[test]
        fn prop_len_never_exceeds_capacity(
            capacity in 1usize..64,
            values in proptest::collection::vec(any::<u32>(), 0..256),
        ) {
            let mut buffer = HistoryBuffer::new(capacity);
            for value in &values {
                buffer.push(*value);
            }

            prop_assert!(buffer.len() <= capacity);
            prop_assert_eq!(buffer.len(), values.len().min(capacity));

            let expected: Vec<u32> = values[values.len() - buffer.len()..].to_vec();
            prop_assert_eq!(buffer.to_vec(), expected);
        }
    }
}
