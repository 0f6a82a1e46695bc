//! Per-worker live-cell sets.
//!
//! The union across workers is the live population. Each set is written
//! only by its owning worker during a phase (swap-removal while expanding,
//! appends while resolving) and only by the main thread between phases;
//! capacity is pre-reserved before the resolution phase so appends never
//! reallocate while the phase runs.

use crate::point::Point;
use std::cell::UnsafeCell;

pub(crate) struct AliveSets {
    sets: Vec<UnsafeCell<Vec<Point>>>,
}

unsafe impl Sync for AliveSets {}

impl AliveSets {
    pub(crate) fn new(threads: usize, initial_capacity: usize) -> Self {
        Self {
            sets: (0..threads)
                .map(|_| UnsafeCell::new(Vec::with_capacity(initial_capacity)))
                .collect(),
        }
    }

    /// # Safety
    ///
    /// Callable by worker `t` during its phase, or by the main thread while
    /// all workers are parked. Never by anybody else.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub(crate) unsafe fn get_mut(&self, t: usize) -> &mut Vec<Point> {
        &mut *self.sets[t].get()
    }

    /// Main thread only, between phases.
    #[inline]
    pub(crate) fn len(&self, t: usize) -> usize {
        unsafe { &*self.sets[t].get() }.len()
    }

    /// Total live population. Main thread only, between phases.
    pub(crate) fn population(&self) -> u64 {
        (0..self.sets.len()).map(|t| self.len(t) as u64).sum()
    }

    /// Grow worker `t`'s set ahead of the resolution phase so that appends
    /// cannot reallocate mid-phase.
    pub(crate) fn reserve(&self, t: usize, additional: usize) {
        let set = unsafe { &mut *self.sets[t].get() };
        set.reserve(additional);
    }

    /// Snapshot of the whole population. Main thread only, between phases.
    pub(crate) fn collect_points(&self) -> Vec<Point> {
        let mut out = Vec::with_capacity(self.population() as usize);
        for set in &self.sets {
            out.extend_from_slice(unsafe { &*set.get() });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_sums_all_workers() {
        let alive = AliveSets::new(3, 8);
        unsafe {
            alive.get_mut(0).push(Point::new(1, 1));
            alive.get_mut(2).push(Point::new(2, 2));
            alive.get_mut(2).push(Point::new(3, 3));
        }
        assert_eq!(alive.population(), 3);
        assert_eq!(alive.collect_points().len(), 3);
    }
}
