//! RollingHistory type definition

use circular_queue::CircularQueue;

/// Fixed-capacity buffer of samples, most recent first
///
/// Once full, every [RollingHistory::put] discards the oldest sample.
#[derive(Clone)]
pub struct RollingHistory<T> {
    queue: CircularQueue<T>,
}

impl<T> RollingHistory<T> {
    /// Create an empty history holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: CircularQueue::with_capacity(capacity),
        }
    }

    /// Create a full history of `capacity` copies of `value`
    pub fn filled(capacity: usize, value: T) -> Self
    where
        T: Clone,
    {
        let mut this = Self::new(capacity);
        for _ in 0..capacity {
            this.put(value.clone());
        }
        this
    }

    /// Insert a sample at the most recent position
    pub fn put(&mut self, value: T) {
        self.queue.push(value);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Sample at `index`, 0 being the most recent one
    pub fn get(&self, index: usize) -> Option<&T> {
        self.queue.iter().nth(index)
    }

    pub fn latest(&self) -> Option<&T> {
        self.get(0)
    }

    /// Iterate from the most recent sample to the oldest one
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.queue.iter()
    }

    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.queue.iter().any(|item| item == value)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RollingHistory<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_last_values() {
        let mut history = RollingHistory::new(5);
        for i in 1..=6 {
            history.put(i);
        }

        assert_eq!(vec![6, 5, 4, 3, 2], history.iter().copied().collect::<Vec<_>>());
        assert_eq!(5, history.len());
        assert!(!history.contains(&1));
        assert!(history.contains(&2));
        assert!(history.contains(&4));
        assert_eq!(Some(&6), history.latest());
        assert_eq!(Some(&2), history.get(4));
        assert_eq!(None, history.get(5));
    }

    #[test]
    fn test_length_tracks_puts_until_full() {
        let mut history = RollingHistory::new(100);
        assert!(history.is_empty());

        for i in 0..250 {
            history.put(i);
            assert_eq!((i + 1).min(100), history.len());
        }

        let expected: Vec<_> = (150..250).rev().collect();
        assert_eq!(expected, history.iter().copied().collect::<Vec<_>>());
        assert_eq!(100, history.capacity());
    }

    #[test]
    fn test_filled_history() {
        let mut history = RollingHistory::filled(3, 0);
        assert_eq!(3, history.len());

        history.put(7);
        assert_eq!(vec![7, 0, 0], history.iter().copied().collect::<Vec<_>>());
        assert_eq!(vec![0, 0, 7], history.iter().rev().copied().collect::<Vec<_>>());
    }

    #[test]
    fn test_debug_lists_most_recent_first() {
        let mut history = RollingHistory::new(2);
        history.put("a");
        history.put("b");
        history.put("c");

        assert_eq!(r#"["c", "b"]"#, format!("{:?}", history));
    }
}
