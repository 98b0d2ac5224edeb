//! Fixed-capacity reservoir sampling

use crate::graph::Fact;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform fixed-size sample of an unbounded fact stream.
///
/// The first `capacity` facts fill the reservoir. Every later fact replaces
/// a uniformly chosen slot with probability `capacity / seen`, so each fact
/// offered ends up in the sample with equal probability.
#[derive(Debug)]
pub struct Reservoir {
    capacity: usize,
    seen: u64,
    items: Vec<Fact>,
    rng: StdRng,
}

impl Reservoir {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    /// Deterministic reservoir for reproducible runs
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            capacity,
            seen: 0,
            items: Vec::with_capacity(capacity.min(1 << 16)),
            rng,
        }
    }

    pub fn offer(&mut self, fact: Fact) {
        if self.items.len() < self.capacity {
            self.items.push(fact);
        } else {
            let slot = self.rng.gen_range(0..=self.seen);
            if slot < self.capacity as u64 {
                self.items[slot as usize] = fact;
            }
        }
        self.seen += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of facts offered so far
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Fact] {
        &self.items
    }

    /// Take the current sample, leaving the reservoir empty
    pub fn into_sample(self) -> Vec<Fact> {
        self.items
    }
}

impl Extend<Fact> for Reservoir {
    fn extend<T: IntoIterator<Item = Fact>>(&mut self, iter: T) {
        for fact in iter {
            self.offer(fact);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(i: usize) -> Fact {
        Fact::new("pc", "read-address", i.to_string())
    }

    #[test]
    fn fills_before_sampling() {
        let mut reservoir = Reservoir::with_seed(4, 7);
        reservoir.extend((0..3).map(fact));
        assert_eq!(reservoir.len(), 3);
        assert_eq!(reservoir.items()[2], fact(2));
    }

    #[test]
    fn stays_at_capacity() {
        let mut reservoir = Reservoir::with_seed(10, 42);
        reservoir.extend((0..1000).map(fact));
        assert_eq!(reservoir.len(), 10);
        assert_eq!(reservoir.seen(), 1000);
    }

    #[test]
    fn sampling_is_roughly_uniform() {
        const K: usize = 5;
        const M: usize = 50;
        const TRIALS: usize = 4000;

        let mut hits = vec![0usize; M];
        for seed in 0..TRIALS {
            let mut reservoir = Reservoir::with_seed(K, seed as u64);
            reservoir.extend((0..M).map(fact));
            for item in reservoir.items() {
                let idx: usize = item.object.parse().unwrap();
                hits[idx] += 1;
            }
        }

        // Expected frequency K/M = 0.1, i.e. 400 hits per fact
        let expected = TRIALS as f64 * K as f64 / M as f64;
        for (idx, &count) in hits.iter().enumerate() {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(deviation < 0.25, "fact {} sampled {} times", idx, count);
        }
    }
}
