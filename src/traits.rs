use crate::Pattern;
use anyhow::Result;

/// Common surface of the Life engines in this crate.
///
/// The parallel engine and the naive reference implement the same trait so
/// tests and benches can cross-check them generation by generation.
pub trait LifeEngine {
    /// Load a pattern, replacing any existing population.
    fn load_pattern(&mut self, pattern: &Pattern) -> Result<()>;

    /// Returns the current population as a pattern.
    fn current_state(&self) -> Pattern;

    /// Advance the simulation by `generations` steps.
    fn step_n(&mut self, generations: u64);
}
