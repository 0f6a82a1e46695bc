//! The two worker phases of a generation.
//!
//! Expansion walks each worker's alive set and turns it into per-cell
//! neighbour contributions in the arena; resolution classifies every arena
//! cell and rebuilds the alive sets and the next activity map. The phases
//! are barrier-separated, which is what makes the resolution phase's
//! unsynchronised value reads sound.

use super::arena::CellArena;
use super::barrier::{GenParams, WorkerTask};
use super::core::EngineShared;
use smallvec::SmallVec;
use std::sync::Arc;

pub(crate) fn worker_loop(shared: Arc<EngineShared>, t: usize) {
    let mut epoch = 0u64;
    loop {
        match shared.barrier.await_release(&mut epoch) {
            WorkerTask::ExpandAlive(p) => expand_alive(&shared, t, &p),
            WorkerTask::ResolveCells(p) => resolve_cells(&shared, t, &p),
            WorkerTask::Shutdown => break,
        }
        shared.barrier.finish();
    }
}

/// Walk `alive[t]`, emitting the cell's own +10 and +1 per neighbour into
/// the hash for everything living in or next to an active tile.
///
/// Cells in inactive tiles are stable this generation: they stay in the
/// alive set and never enter the arena. A stable cell strictly inside its
/// tile cannot influence any evaluated cell at all, so only the ones on a
/// tile edge emit contributions, and only for neighbours that cross into
/// an active tile.
pub(crate) fn expand_alive(shared: &EngineShared, t: usize, p: &GenParams) {
    let threads = shared.cfg.threads;
    let stride = threads as u32;
    let mut cursor = CellArena::partition_start(t, threads);
    let grid = &shared.grids[p.grid_read];
    let m = shared.cfg.static_mask;
    // Exclusive during this phase: t is this worker's own index.
    let alive = unsafe { shared.alive.get_mut(t) };
    let stats = unsafe { shared.stats.get_mut(t) };
    stats.reset();
    let (cols, rows) = shared.screen.dims();

    let mut i = 0;
    while i < alive.len() {
        let pt = alive[i];

        if p.draw {
            let col = pt.x.wrapping_sub(p.view_xl);
            let row = pt.y.wrapping_sub(p.view_yl);
            // Row 0 carries the status line; the strict bound also keeps a
            // cell one row above the window from wrapping onto it.
            if col < cols && row < rows.saturating_sub(1) {
                shared.screen.plot(p.screen_buf, col, row + 1);
            }
        }

        if grid.is_active(pt) {
            // The cell migrates into the arena for evaluation; whatever
            // survives comes back through the resolution phase.
            alive.swap_remove(i);
            shared
                .hash
                .add_cell(&shared.arena, &mut cursor, stride, pt.packed(), 10);
            for q in pt.neighbours() {
                if grid.is_active(q) {
                    shared
                        .hash
                        .add_cell(&shared.arena, &mut cursor, stride, q.packed(), 1);
                }
            }
        } else {
            stats.statics += 1;
            let lx = pt.x & m;
            let ly = pt.y & m;
            if lx == 0 || lx == m || ly == 0 || ly == m {
                for q in pt.neighbours() {
                    if grid.is_active(q) {
                        shared
                            .hash
                            .add_cell(&shared.arena, &mut cursor, stride, q.packed(), 1);
                    }
                }
            }
            i += 1;
        }
    }

    shared.arena.store_cursor(t, cursor);
}

/// Classify every arena cell of this generation and rebuild state for the
/// next one.
///
/// Work is balanced by consuming the partitions in round-robin chunks:
/// on step `j`, worker `t` takes chunk `j` of partition `(t+j) mod n`, so
/// each chunk has exactly one deterministic owner even when one worker
/// produced far more cells than the others.
pub(crate) fn resolve_cells(shared: &EngineShared, t: usize, p: &GenParams) {
    let threads = shared.cfg.threads;
    let chunk = shared.cfg.chunk_size as u64;
    let grid_next = &shared.grids[p.grid_read ^ 1];
    let alive = unsafe { shared.alive.get_mut(t) };
    let stats = unsafe { shared.stats.get_mut(t) };

    let lens: SmallVec<[u32; 16]> = (0..threads)
        .map(|w| shared.arena.partition_len(w, threads))
        .collect();
    let max_len = lens.iter().copied().max().unwrap_or(0) as u64;

    let mut j = 0u64;
    while j * chunk < max_len {
        let part = (t + j as usize) % threads;
        let len = lens[part] as u64;
        let begin = j * chunk;
        if begin < len {
            let end = (begin + chunk).min(len);
            let start_idx = CellArena::partition_start(part, threads);
            for e in begin..end {
                // Every index is visited by exactly one worker, so the
                // relaxed value load is ordered by the phase barrier alone.
                let cell = unsafe { shared.arena.get(start_idx + e as u32 * threads as u32) };
                match cell.value() {
                    // Dead cell with exactly three live neighbours: birth.
                    3 => {
                        let pt = cell.point();
                        alive.push(pt);
                        grid_next.set_active(pt);
                        stats.births += 1;
                        if p.tracking {
                            stats.track(pt, p, true);
                        }
                    }
                    // Live cell with two or three neighbours survives; the
                    // area stays quiescent, so no activity flag.
                    12 | 13 => alive.push(cell.point()),
                    // Live cell with any other neighbour count dies.
                    v if v >= 10 => {
                        let pt = cell.point();
                        grid_next.set_active(pt);
                        stats.deaths += 1;
                        if p.tracking {
                            stats.track(pt, p, false);
                        }
                    }
                    // Dead cell with the wrong neighbour count: drop.
                    _ => {}
                }
            }
        }
        j += 1;
    }
}
