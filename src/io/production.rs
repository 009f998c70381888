//! Production RNG backed by an entropy-seeded ChaCha8 generator.

use super::Rng;
use rand::SeedableRng;

/// Entropy-seeded RNG for non-simulated runs
pub struct ProductionRng {
    inner: rand_chacha::ChaCha8Rng,
}

impl ProductionRng {
    pub fn new() -> Self {
        ProductionRng {
            inner: rand_chacha::ChaCha8Rng::from_entropy(),
        }
    }
}

impl Default for ProductionRng {
    fn default() -> Self {
        Self::new()
    }
}

impl Rng for ProductionRng {
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
