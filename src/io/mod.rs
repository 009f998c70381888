//! I/O Abstractions for Deterministic Simulation Testing
//!
//! Randomness goes through the `Rng` trait so that fault injection and
//! workload generation are reproducible from a seed.
//!
//! - `production::ProductionRng`: entropy-seeded, for real runs
//! - `simulation::SimulatedRng`: seeded ChaCha8, for DST

pub mod production;
pub mod simulation;

pub use production::ProductionRng;
pub use simulation::SimulatedRng;

/// Random number source used by buggify and the DST harnesses
pub trait Rng: Send {
    /// Next raw 64-bit value
    fn next_u64(&mut self) -> u64;

    /// Returns true with the given probability (clamped to [0, 1])
    fn gen_bool(&mut self, probability: f64) -> bool;

    /// Uniform value in `[min, max)`. Returns `min` when the range is empty.
    fn gen_range(&mut self, min: u64, max: u64) -> u64;
}
