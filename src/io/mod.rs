//! Randomness abstraction
//!
//! Skip-list leveling, the simulated store and the DST harnesses all draw from
//! an `Rng` so that a single seed reproduces an entire run.

pub mod simulation;

pub use simulation::SimulatedRng;

/// Source of randomness used by the engines and the simulation harnesses
pub trait Rng: Send {
    fn next_u64(&mut self) -> u64;

    /// Returns true with the given probability (clamped to [0, 1])
    fn gen_bool(&mut self, probability: f64) -> bool;

    /// Uniform value in `[min, max)`; returns `min` when the range is empty
    fn gen_range(&mut self, min: u64, max: u64) -> u64;

    /// Fair coin flip
    fn coin(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }
}
