//! Tile activity map: one flag per `static_size` x `static_size` tile.
//!
//! A tile is active when the previous generation produced a birth or death
//! in it (or on an adjoining boundary), and only active tiles are evaluated
//! at all. The map shares the spatial hash's index function, so a flag is
//! really "some tile hashing here is active": collisions over-approximate
//! activity, which costs work but never correctness.

use super::hash::spread_index;
use crate::point::Point;
use smallvec::SmallVec;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};

struct ActivityInner {
    tiles: Vec<AtomicBool>,
    order: u32,
    shift: u32,
}

/// Boolean array parallel to one generation's hash table.
///
/// Read-only during the expansion phase, written (set-true only) during the
/// resolution phase. Concurrent setters may race; a lost store is repeated
/// by the other thread, so the result is identical.
pub(crate) struct ActivityMap {
    inner: UnsafeCell<ActivityInner>,
    /// `static_size - 1`; ORing a coordinate selects the tile representative.
    mask: u32,
}

unsafe impl Sync for ActivityMap {}

impl ActivityMap {
    pub(crate) fn new(order: u32, static_mask: u32) -> Self {
        Self {
            inner: UnsafeCell::new(ActivityInner {
                tiles: (0..1usize << (2 * order))
                    .map(|_| AtomicBool::new(false))
                    .collect(),
                order,
                shift: 32 - order,
            }),
            mask: static_mask,
        }
    }

    /// Whether the tile containing `p` must be evaluated this generation.
    #[inline]
    pub(crate) fn is_active(&self, p: Point) -> bool {
        let inner = unsafe { &*self.inner.get() };
        let h = spread_index(p.x | self.mask, p.y | self.mask, inner.shift, inner.order);
        inner.tiles[h].load(Ordering::Relaxed)
    }

    /// Flag the tile containing `p` for the next generation. When `p` sits
    /// on a tile boundary the change is visible from the adjoining tile as
    /// well, so the 1 (edge) or 3 (corner) neighbouring tiles are flagged
    /// too.
    pub(crate) fn set_active(&self, p: Point) {
        let m = self.mask;
        let mut xs: SmallVec<[u32; 2]> = SmallVec::new();
        xs.push(p.x);
        if p.x & m == 0 {
            xs.push(p.x.wrapping_sub(1));
        } else if p.x & m == m {
            xs.push(p.x.wrapping_add(1));
        }
        let mut ys: SmallVec<[u32; 2]> = SmallVec::new();
        ys.push(p.y);
        if p.y & m == 0 {
            ys.push(p.y.wrapping_sub(1));
        } else if p.y & m == m {
            ys.push(p.y.wrapping_add(1));
        }

        let inner = unsafe { &*self.inner.get() };
        for &tx in &xs {
            for &ty in &ys {
                let h = spread_index(tx | m, ty | m, inner.shift, inner.order);
                inner.tiles[h].store(true, Ordering::Relaxed);
            }
        }
    }

    /// Clear every flag and adopt the order of the new generation's hash.
    /// Main thread only, between phases.
    pub(crate) fn reset(&self, order: u32) {
        let inner = unsafe { &mut *self.inner.get() };
        let len = 1usize << (2 * order);
        if inner.tiles.len() != len {
            inner.tiles = (0..len).map(|_| AtomicBool::new(false)).collect();
        } else {
            for tile in inner.tiles.iter_mut() {
                *tile.get_mut() = false;
            }
        }
        inner.order = order;
        inner.shift = 32 - order;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::ORIGIN;

    fn map() -> ActivityMap {
        ActivityMap::new(8, 3)
    }

    #[test]
    fn interior_event_flags_only_its_tile() {
        let m = map();
        // (ORIGIN+1, ORIGIN+1) is strictly inside its 4x4 tile.
        m.set_active(Point::new(ORIGIN + 1, ORIGIN + 1));
        assert!(m.is_active(Point::new(ORIGIN, ORIGIN)));
        assert!(m.is_active(Point::new(ORIGIN + 3, ORIGIN + 3)));
        assert!(!m.is_active(Point::new(ORIGIN + 4, ORIGIN)));
        assert!(!m.is_active(Point::new(ORIGIN, ORIGIN + 4)));
        assert!(!m.is_active(Point::new(ORIGIN - 1, ORIGIN)));
    }

    #[test]
    fn east_edge_event_spills_east() {
        let m = map();
        m.set_active(Point::new(ORIGIN + 3, ORIGIN + 1));
        assert!(m.is_active(Point::new(ORIGIN, ORIGIN)));
        assert!(m.is_active(Point::new(ORIGIN + 4, ORIGIN)));
        assert!(!m.is_active(Point::new(ORIGIN, ORIGIN + 4)));
    }

    #[test]
    fn corner_event_flags_three_neighbours() {
        let m = map();
        m.set_active(Point::new(ORIGIN, ORIGIN));
        assert!(m.is_active(Point::new(ORIGIN, ORIGIN)));
        assert!(m.is_active(Point::new(ORIGIN - 1, ORIGIN)));
        assert!(m.is_active(Point::new(ORIGIN, ORIGIN - 1)));
        assert!(m.is_active(Point::new(ORIGIN - 1, ORIGIN - 1)));
    }

    #[test]
    fn reset_clears_flags() {
        let m = map();
        m.set_active(Point::new(ORIGIN, ORIGIN));
        m.reset(8);
        assert!(!m.is_active(Point::new(ORIGIN, ORIGIN)));
    }
}
