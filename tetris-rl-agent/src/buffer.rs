//! Experience replay buffer

use rand::rngs::StdRng;
use std::collections::VecDeque;

use tetris_rl_core::Transition;

/// Fixed-capacity, insertion-ordered store of transition records
///
/// Oldest records are evicted first once the capacity is exceeded.
/// Sampling uses the caller's random source; the buffer owns no
/// randomness of its own.
#[derive(Debug, Clone)]
pub struct ReplayBuffer<O, A> {
    /// Buffer storage
    buffer: VecDeque<Transition<O, A>>,
    /// Maximum capacity
    capacity: usize,
}

impl<O, A> ReplayBuffer<O, A>
where
    O: Clone,
    A: Clone,
{
    /// Create a new replay buffer
    ///
    /// # Panics
    /// Panics on a zero capacity; a store that can hold nothing is a
    /// construction bug.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay buffer capacity must be positive");
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a transition, evicting the oldest record when full
    pub fn push(&mut self, transition: Transition<O, A>) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Sample transitions uniformly, without replacement within one call
    ///
    /// Returns `batch_size` records chosen independently and uniformly
    /// at random, or every held record when fewer than `batch_size`
    /// exist. The result carries no ordering guarantee.
    ///
    /// # Panics
    /// Panics on a zero `batch_size`; asking for an empty sample is a
    /// caller contract violation.
    pub fn sample(&self, rng: &mut StdRng, batch_size: usize) -> Vec<Transition<O, A>> {
        assert!(batch_size > 0, "sample size must be positive");

        if self.buffer.len() <= batch_size {
            return self.buffer.iter().cloned().collect();
        }

        rand::seq::index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|i| self.buffer[i].clone())
            .collect()
    }

    /// Get the current size of the buffer
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The configured capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over the held records, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Transition<O, A>> {
        self.buffer.iter()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tetris_rl_core::Reward;

    // transitions over unit observations keep the identity visible in
    // the action slot
    fn tagged(tag: u32) -> Transition<(), u32> {
        Transition::new((), tag, Reward(0.0), (), false)
    }

    #[test]
    fn capacity_is_never_exceeded_and_eviction_is_fifo() {
        let mut buffer = ReplayBuffer::new(5);
        for tag in 0..12 {
            buffer.push(tagged(tag));
            assert!(buffer.len() <= 5);
        }

        // exactly the most recent records remain, in insertion order
        let held: Vec<u32> = buffer.iter().map(|t| t.action).collect();
        assert_eq!(held, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn sample_returns_distinct_records() {
        let mut buffer = ReplayBuffer::new(100);
        for tag in 0..50 {
            buffer.push(tagged(tag));
        }

        let mut rng = StdRng::seed_from_u64(13);
        let batch = buffer.sample(&mut rng, 20);
        assert_eq!(batch.len(), 20);

        let mut tags: Vec<u32> = batch.iter().map(|t| t.action).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), 20);
    }

    #[test]
    fn oversized_sample_returns_everything() {
        let mut buffer = ReplayBuffer::new(100);
        for tag in 0..3 {
            buffer.push(tagged(tag));
        }

        let mut rng = StdRng::seed_from_u64(1);
        let batch = buffer.sample(&mut rng, 10);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    #[should_panic(expected = "sample size must be positive")]
    fn zero_sample_size_is_a_contract_violation() {
        let mut buffer = ReplayBuffer::new(10);
        buffer.push(tagged(0));

        let mut rng = StdRng::seed_from_u64(0);
        let _ = buffer.sample(&mut rng, 0);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut buffer = ReplayBuffer::new(10);
        buffer.push(tagged(1));
        assert!(!buffer.is_empty());
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 10);
    }
}
