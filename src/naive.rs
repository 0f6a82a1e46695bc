//! Straightforward set-based Life engine.
//!
//! Deliberately unclever: every candidate cell is recounted from scratch
//! each generation. It exists as the trusted reference the parallel
//! engine's tests and benches compare against.

use crate::point::Point;
use crate::traits::LifeEngine;
use crate::Pattern;
use ahash::AHashSet;
use anyhow::Result;

#[derive(Default)]
pub struct NaiveLife {
    cells: AHashSet<Point>,
}

impl NaiveLife {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn population(&self) -> u64 {
        self.cells.len() as u64
    }

    pub fn contains(&self, p: Point) -> bool {
        self.cells.contains(&p)
    }

    pub fn step(&mut self) {
        let mut candidates = AHashSet::with_capacity(self.cells.len() * 4);
        for &p in &self.cells {
            candidates.insert(p);
            for q in p.neighbours() {
                candidates.insert(q);
            }
        }

        let mut next = AHashSet::with_capacity(self.cells.len());
        for &p in &candidates {
            let live_neighbours = p
                .neighbours()
                .iter()
                .filter(|q| self.cells.contains(q))
                .count();
            let alive = self.cells.contains(&p);
            if matches!((alive, live_neighbours), (true, 2) | (_, 3)) {
                next.insert(p);
            }
        }
        self.cells = next;
    }
}

impl LifeEngine for NaiveLife {
    fn load_pattern(&mut self, pattern: &Pattern) -> Result<()> {
        self.cells = pattern.points().iter().copied().collect();
        Ok(())
    }

    fn current_state(&self) -> Pattern {
        Pattern::from_points(self.cells.iter().copied().collect())
    }

    fn step_n(&mut self, generations: u64) {
        for _ in 0..generations {
            self.step();
        }
    }
}
