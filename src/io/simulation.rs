//! Deterministic RNG for simulation and skip-list leveling

use super::Rng;
use rand::SeedableRng;

/// ChaCha8-backed RNG; the same seed always yields the same sequence
#[derive(Debug, Clone)]
pub struct SimulatedRng {
    inner: rand_chacha::ChaCha8Rng,
}

impl SimulatedRng {
    pub fn new(seed: u64) -> Self {
        SimulatedRng {
            inner: rand_chacha::ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seeded from OS entropy, for production executors without a configured seed
    pub fn from_entropy() -> Self {
        SimulatedRng {
            inner: rand_chacha::ChaCha8Rng::seed_from_u64(rand::random()),
        }
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
