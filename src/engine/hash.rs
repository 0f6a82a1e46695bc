//! Lock-free spatial hash over the cell arena.
//!
//! Buckets hold arena indices (0 = empty); collisions chain through the
//! cells' `next` fields. Insertion is multi-producer: workers race on the
//! bucket head with a compare-and-set, and a lost race simply re-walks the
//! chain and retries with the same prepared slot.

use super::arena::CellArena;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Smallest table order; 2^(2*6) = 4096 buckets.
pub(crate) const MIN_ORDER: u32 = 6;
/// Largest table order; 2^(2*12) = 16M buckets.
pub(crate) const MAX_ORDER: u32 = 12;

/// Mixes a coordinate pair into a `2*order`-bit table index.
///
/// The middle bits of the wrapped square are cheap, seedless and
/// experimentally well distributed for the clustered coordinates Life
/// patterns produce, provided coordinates sit near a large origin. The two
/// k-bit halves occupy disjoint ranges, so the XOR is a concatenation.
#[inline]
pub(crate) fn spread_index(x: u32, y: u32, shift: u32, order: u32) -> usize {
    let hx = x.wrapping_mul(x) >> shift;
    let hy = y.wrapping_mul(y) >> shift;
    (hx ^ (hy << order)) as usize
}

/// Pick the smallest order whose table holds `expected` populated cells,
/// clamped to `[MIN_ORDER, MAX_ORDER]`.
pub(crate) fn order_for(expected: usize) -> u32 {
    let mut order = MIN_ORDER;
    while order < MAX_ORDER && (1usize << (2 * order)) < expected {
        order += 1;
    }
    order
}

struct HashInner {
    heads: Vec<AtomicU32>,
    order: u32,
    shift: u32,
}

/// Indexed bucket heads referencing the arena.
///
/// Resized and zeroed by the main thread between generations; hammered by
/// all workers during the expansion phase.
pub(crate) struct CellHash {
    inner: UnsafeCell<HashInner>,
}

unsafe impl Sync for CellHash {}

impl CellHash {
    pub(crate) fn new(order: u32) -> Self {
        Self {
            inner: UnsafeCell::new(HashInner {
                heads: (0..1usize << (2 * order)).map(|_| AtomicU32::new(0)).collect(),
                order,
                shift: 32 - order,
            }),
        }
    }

    #[inline]
    pub(crate) fn order(&self) -> u32 {
        unsafe { &*self.inner.get() }.order
    }

    /// Re-key the table for a new generation. Main thread only, between
    /// phases: the bucket array is reallocated when the order changes and
    /// zeroed otherwise.
    pub(crate) fn reset(&self, order: u32) {
        let inner = unsafe { &mut *self.inner.get() };
        let len = 1usize << (2 * order);
        if inner.heads.len() != len {
            inner.heads = (0..len).map(|_| AtomicU32::new(0)).collect();
        } else {
            for head in inner.heads.iter_mut() {
                *head.get_mut() = 0;
            }
        }
        inner.order = order;
        inner.shift = 32 - order;
    }

    /// Merge a contribution for point `pt` (packed): add `v` to the cell's
    /// sum if it already has an arena entry, otherwise prepend a fresh
    /// entry at the worker's cursor slot.
    ///
    /// `cursor` is the worker's next free arena index and advances by
    /// `stride` (the worker count) only once a prepared slot is actually
    /// published; a slot prepared for a CAS that loses the race is reused
    /// transparently on the retry.
    #[inline]
    pub(crate) fn add_cell(
        &self,
        arena: &CellArena,
        cursor: &mut u32,
        stride: u32,
        pt: u64,
        v: u8,
    ) {
        let inner = unsafe { &*self.inner.get() };
        let h = spread_index(pt as u32, (pt >> 32) as u32, inner.shift, inner.order);
        let bucket = &inner.heads[h];

        let mut head = bucket.load(Ordering::Acquire);
        loop {
            // Walk the chain; on a hit the add is commutative and the sum
            // is only read after the phase barrier.
            let mut idx = head;
            while idx != 0 {
                let cell = unsafe { arena.get(idx) };
                if cell.packed() == pt {
                    cell.bump(v);
                    return;
                }
                idx = cell.next();
            }

            // Miss: prepare our slot and try to publish it. The release on
            // success publishes the slot's fields; the acquire on failure
            // lets the re-walk read the newly linked records.
            arena.write_slot(*cursor, pt, head, v);
            match bucket.compare_exchange(head, *cursor, Ordering::Release, Ordering::Acquire) {
                Ok(_) => {
                    *cursor += stride;
                    return;
                }
                Err(actual) => head = actual,
            }
        }
    }

    /// Chain head for an externally computed index. Used by invariant
    /// checks; the hot path inlines the walk.
    #[cfg(test)]
    pub(crate) fn head(&self, h: usize) -> u32 {
        unsafe { &*self.inner.get() }.heads[h].load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn buckets(&self) -> usize {
        unsafe { &*self.inner.get() }.heads.len()
    }
}
