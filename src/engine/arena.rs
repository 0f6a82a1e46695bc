//! Flat cell store backing the per-generation hash chains.
//!
//! The arena is append-only within a generation and partitioned across
//! workers by stride: worker `t` of `n` owns indices `{t, t+n, t+2n, ...}`
//! (worker 0 starts at `n`, reserving index 0 as the end-of-chain
//! sentinel). Each worker advances its own cursor, so slot allocation
//! needs no synchronisation at all; publication happens through the
//! bucket-head CAS in [`super::hash::CellHash`].

use crate::point::Point;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// One heap record: a cell that received at least one contribution this
/// generation.
///
/// `v` accumulates +10 for a live self and +1 per live neighbour, so its
/// final value alone classifies the Life outcome: `v % 10` is the
/// neighbour count and `v / 10` tells whether the cell was live.
pub(crate) struct Cell {
    /// Packed point, compared as a single word during chain walks.
    pt: u64,
    /// Arena index of the next cell in the same bucket; 0 ends the chain.
    next: u32,
    /// Contribution sum; concurrently incremented on chain hits.
    v: AtomicU8,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            pt: 0,
            next: 0,
            v: AtomicU8::new(0),
        }
    }
}

impl Cell {
    #[inline]
    pub(crate) fn point(&self) -> Point {
        Point::from_packed(self.pt)
    }

    #[inline]
    pub(crate) fn packed(&self) -> u64 {
        self.pt
    }

    #[inline]
    pub(crate) fn next(&self) -> u32 {
        self.next
    }

    /// Commutative add; the sum is only read after the phase barrier, so
    /// relaxed ordering suffices.
    #[inline]
    pub(crate) fn bump(&self, v: u8) {
        self.v.fetch_add(v, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn value(&self) -> u8 {
        self.v.load(Ordering::Relaxed)
    }
}

/// Contiguous, stride-partitioned cell store.
///
/// Interior mutability follows the usual discipline here: slots are written
/// only by the owning worker before publication, capacity changes happen
/// only on the main thread while all workers are parked, and the phase
/// barrier provides the necessary ordering for everything else.
pub(crate) struct CellArena {
    cells: UnsafeCell<Vec<Cell>>,
    /// Per-worker cursor recorded at the end of the expansion phase; the
    /// resolution phase iterates exactly `(cursor - start) / n` entries of
    /// each partition.
    cursors: Vec<AtomicU32>,
}

unsafe impl Sync for CellArena {}

impl CellArena {
    pub(crate) fn new(threads: usize, initial_capacity: usize) -> Self {
        let mut cells = Vec::new();
        cells.resize_with(initial_capacity.max(threads + 1), Cell::default);
        Self {
            cells: UnsafeCell::new(cells),
            cursors: (0..threads)
                .map(|t| AtomicU32::new(Self::partition_start(t, threads)))
                .collect(),
        }
    }

    /// First arena index of worker `t`'s partition.
    #[inline]
    pub(crate) fn partition_start(t: usize, threads: usize) -> u32 {
        if t == 0 {
            threads as u32
        } else {
            t as u32
        }
    }

    /// Grow the backing store so every cursor stays in bounds. Main thread
    /// only, between phases; the arena never shrinks, so held indices stay
    /// stable for the whole generation.
    pub(crate) fn ensure_capacity(&self, capacity: usize) {
        let cells = unsafe { &mut *self.cells.get() };
        if cells.len() < capacity {
            cells.resize_with(capacity, Cell::default);
        }
    }

    /// # Safety
    ///
    /// `idx` must be a published arena index (reachable from a bucket head)
    /// or an index below the owning worker's cursor.
    #[inline]
    pub(crate) unsafe fn get(&self, idx: u32) -> &Cell {
        &*(*self.cells.get()).as_ptr().add(idx as usize)
    }

    /// Prepare the slot at `idx` for publication. Owner-only: no other
    /// thread can observe the slot until the bucket CAS succeeds.
    ///
    /// Running out of slots means the sizing contract was violated by the
    /// caller; that is a bug, not a recoverable condition.
    #[inline]
    pub(crate) fn write_slot(&self, idx: u32, pt: u64, next: u32, v: u8) {
        let cells = self.cells.get();
        let len = unsafe { (*cells).len() };
        assert!(
            (idx as usize) < len,
            "cell arena overflow: index {idx} with capacity {len}"
        );
        let cell = unsafe { &mut *(*cells).as_mut_ptr().add(idx as usize) };
        cell.pt = pt;
        cell.next = next;
        *cell.v.get_mut() = v;
    }

    #[inline]
    pub(crate) fn store_cursor(&self, t: usize, cursor: u32) {
        self.cursors[t].store(cursor, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn cursor(&self, t: usize) -> u32 {
        self.cursors[t].load(Ordering::Relaxed)
    }

    /// Entries committed by worker `t` in the last expansion phase.
    #[inline]
    pub(crate) fn partition_len(&self, t: usize, threads: usize) -> u32 {
        (self.cursor(t) - Self::partition_start(t, threads)) / threads as u32
    }

    /// Total entries committed in the last expansion phase.
    pub(crate) fn entries(&self, threads: usize) -> usize {
        (0..threads)
            .map(|t| self.partition_len(t, threads) as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_start_reserves_sentinel() {
        assert_eq!(CellArena::partition_start(0, 4), 4);
        assert_eq!(CellArena::partition_start(1, 4), 1);
        assert_eq!(CellArena::partition_start(3, 4), 3);
        assert_eq!(CellArena::partition_start(0, 1), 1);
    }

    #[test]
    fn partition_len_counts_strided_commits() {
        let arena = CellArena::new(2, 64);
        // Worker 0 commits three slots: 2, 4, 6 -> cursor 8.
        arena.store_cursor(0, 8);
        // Worker 1 commits one slot: 1 -> cursor 3.
        arena.store_cursor(1, 3);
        assert_eq!(arena.partition_len(0, 2), 3);
        assert_eq!(arena.partition_len(1, 2), 1);
        assert_eq!(arena.entries(2), 4);
    }

    #[test]
    #[should_panic(expected = "cell arena overflow")]
    fn overflow_is_a_contract_violation() {
        let arena = CellArena::new(1, 4);
        arena.write_slot(4, 0, 0, 1);
    }
}
