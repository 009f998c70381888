//! Deterministic RNG for simulation testing
//!
//! Given the same seed, every fault decision and generated workload is
//! identical across runs, so a failing seed can be replayed exactly.

use super::Rng;

/// Seeded ChaCha8 RNG
#[derive(Debug, Clone)]
pub struct SimulatedRng {
    inner: rand_chacha::ChaCha8Rng,
}

impl SimulatedRng {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        SimulatedRng {
            inner: rand_chacha::ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Derive an independent RNG (for handing a stream to a sub-component)
    pub fn fork(&mut self) -> SimulatedRng {
        SimulatedRng::new(self.next_u64())
    }
}

impl Rng for SimulatedRng {
    fn next_u64(&mut self) -> u64 {
        use rand::RngCore;
        self.inner.next_u64()
    }

    fn gen_bool(&mut self, probability: f64) -> bool {
        use rand::Rng;
        self.inner.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        use rand::Rng;
        if min >= max {
            return min;
        }
        self.inner.gen_range(min..max)
    }
}
