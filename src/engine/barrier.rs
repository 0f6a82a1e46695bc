//! Phase coordination between the main thread and the worker pool.
//!
//! Each generation crosses two edges per phase: "all workers released" and
//! "all workers finished". The release edge is an epoch-stamped task slot
//! (workers sleep until the epoch advances), the finish edge a counted
//! latch the main thread sleeps on. Dispatch is a two-arm task enum read
//! at the worker loop head; cancellation is cooperative via the shutdown
//! variant.

use crate::point::Point;
use std::sync::{Condvar, Mutex};

/// Per-generation parameters snapshotted into each released task, so that
/// workers never touch main-thread view state directly.
#[derive(Clone, Copy, Debug)]
pub(crate) struct GenParams {
    /// Which of the two activity maps is read during expansion; the other
    /// one collects the next generation's flags during resolution.
    pub grid_read: usize,
    /// Which screen buffer live cells are plotted into.
    pub screen_buf: usize,
    /// False in headless runs; skips all screen work.
    pub draw: bool,
    /// Top-left world corner of the view window.
    pub view_xl: u32,
    pub view_yl: u32,
    /// Tracked centre and sensitivity for the autotracking accumulators.
    pub centre_x: u32,
    pub centre_y: u32,
    pub sensitivity: u32,
    pub tracking: bool,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum WorkerTask {
    /// Walk the alive sets, expanding contributions into the arena.
    ExpandAlive(GenParams),
    /// Classify arena cells, rebuilding the alive sets and activity map.
    ResolveCells(GenParams),
    /// Observe the cancellation flag and exit the worker loop.
    Shutdown,
}

struct TaskSlot {
    epoch: u64,
    task: WorkerTask,
}

pub(crate) struct PhaseBarrier {
    slot: Mutex<TaskSlot>,
    released: Condvar,
    running: Mutex<usize>,
    finished: Condvar,
}

impl PhaseBarrier {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(TaskSlot {
                epoch: 0,
                task: WorkerTask::Shutdown,
            }),
            released: Condvar::new(),
            running: Mutex::new(0),
            finished: Condvar::new(),
        }
    }

    /// Release all `workers` into `task`. Main thread only; must not be
    /// called again before [`PhaseBarrier::wait_finished`] returns.
    pub(crate) fn release(&self, task: WorkerTask, workers: usize) {
        {
            let mut running = self.running.lock().unwrap();
            *running = workers;
        }
        let mut slot = self.slot.lock().unwrap();
        slot.epoch += 1;
        slot.task = task;
        self.released.notify_all();
    }

    /// Wake every worker one last time so it can observe shutdown.
    pub(crate) fn shutdown(&self, workers: usize) {
        self.release(WorkerTask::Shutdown, workers);
    }

    /// Park until a task newer than `last_epoch` is released; returns the
    /// task and advances the caller's epoch.
    pub(crate) fn await_release(&self, last_epoch: &mut u64) -> WorkerTask {
        let mut slot = self.slot.lock().unwrap();
        while slot.epoch == *last_epoch {
            slot = self.released.wait(slot).unwrap();
        }
        *last_epoch = slot.epoch;
        slot.task
    }

    /// Worker checks out of the current phase; the last one wakes main.
    pub(crate) fn finish(&self) {
        let mut running = self.running.lock().unwrap();
        *running -= 1;
        if *running == 0 {
            self.finished.notify_one();
        }
    }

    /// Park the main thread until every released worker has finished.
    pub(crate) fn wait_finished(&self) {
        let mut running = self.running.lock().unwrap();
        while *running > 0 {
            running = self.finished.wait(running).unwrap();
        }
    }
}

/// Per-worker accumulators flushed to the main thread after each phase.
///
/// Births and deaths feed the status line, the four directional sums feed
/// autotracking; none of them participate in the simulation itself, so
/// per-worker accumulation summed on the main thread is all the
/// synchronisation they need.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct WorkerStats {
    pub births: u64,
    pub deaths: u64,
    /// Cells retained in place because their tile was inactive.
    pub statics: u64,
    /// Weighted centre-of-activity deltas: increase/decrease per axis.
    pub ix: i64,
    pub dx: i64,
    pub iy: i64,
    pub dy: i64,
}

impl WorkerStats {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold a birth or death at `p` into the directional sums. Events
    /// inside the active neighbourhood contribute their distance's leading
    /// zeros, weighting near events over far ones; births pull the centre
    /// toward themselves, deaths push it away.
    #[inline]
    pub(crate) fn track(&mut self, p: Point, params: &GenParams, birth: bool) {
        let limit = 1u32 << (23 - params.sensitivity.min(11));

        let dx = p.x.wrapping_sub(params.centre_x) as i32;
        let mag = dx.unsigned_abs();
        if mag > 0 && mag < limit {
            let w = mag.leading_zeros() as i64;
            if (dx > 0) == birth {
                self.ix += w;
            } else {
                self.dx += w;
            }
        }

        let dy = p.y.wrapping_sub(params.centre_y) as i32;
        let mag = dy.unsigned_abs();
        if mag > 0 && mag < limit {
            let w = mag.leading_zeros() as i64;
            if (dy > 0) == birth {
                self.iy += w;
            } else {
                self.dy += w;
            }
        }
    }
}

/// Owner-only stats cells, one per worker.
pub(crate) struct WorkerStatsSet {
    stats: Vec<std::cell::UnsafeCell<WorkerStats>>,
}

unsafe impl Sync for WorkerStatsSet {}

impl WorkerStatsSet {
    pub(crate) fn new(threads: usize) -> Self {
        Self {
            stats: (0..threads)
                .map(|_| std::cell::UnsafeCell::new(WorkerStats::default()))
                .collect(),
        }
    }

    /// # Safety
    ///
    /// Same discipline as the alive sets: worker `t` during its phase, the
    /// main thread between phases.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub(crate) unsafe fn get_mut(&self, t: usize) -> &mut WorkerStats {
        &mut *self.stats[t].get()
    }

    /// Main thread only, between phases.
    pub(crate) fn sum(&self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for cell in &self.stats {
            let s = unsafe { &*cell.get() };
            total.births += s.births;
            total.deaths += s.deaths;
            total.statics += s.statics;
            total.ix += s.ix;
            total.dx += s.dx;
            total.iy += s.iy;
            total.dy += s.dy;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::ORIGIN;
    use std::sync::Arc;

    fn params(cx: u32, cy: u32, tg: u32) -> GenParams {
        GenParams {
            grid_read: 0,
            screen_buf: 0,
            draw: false,
            view_xl: 0,
            view_yl: 0,
            centre_x: cx,
            centre_y: cy,
            sensitivity: tg,
            tracking: true,
        }
    }

    #[test]
    fn barrier_runs_both_edges() {
        let barrier = Arc::new(PhaseBarrier::new());
        let b = barrier.clone();
        let worker = std::thread::spawn(move || {
            let mut epoch = 0;
            let mut seen = 0;
            loop {
                match b.await_release(&mut epoch) {
                    WorkerTask::Shutdown => break,
                    _ => seen += 1,
                }
                b.finish();
            }
            seen
        });

        let p = params(0, 0, 1);
        barrier.release(WorkerTask::ExpandAlive(p), 1);
        barrier.wait_finished();
        barrier.release(WorkerTask::ResolveCells(p), 1);
        barrier.wait_finished();
        barrier.shutdown(1);
        assert_eq!(worker.join().unwrap(), 2);
    }

    #[test]
    fn tracking_weights_near_events_higher() {
        let p = params(ORIGIN, ORIGIN, 1);
        let mut near = WorkerStats::default();
        near.track(Point::new(ORIGIN + 2, ORIGIN), &p, true);
        let mut far = WorkerStats::default();
        far.track(Point::new(ORIGIN + 1024, ORIGIN), &p, true);
        assert!(near.ix > far.ix);
        assert_eq!(near.dx, 0);
    }

    #[test]
    fn tracking_ignores_out_of_window_events() {
        let p = params(ORIGIN, ORIGIN, 11);
        let mut s = WorkerStats::default();
        // Sensitivity 11 keeps only |delta| < 2^12.
        s.track(Point::new(ORIGIN + (1 << 12), ORIGIN), &p, true);
        s.track(Point::new(ORIGIN, ORIGIN), &p, true);
        assert_eq!(s.ix, 0);
        assert_eq!(s.dx, 0);
    }

    #[test]
    fn deaths_have_opposite_sign() {
        let p = params(ORIGIN, ORIGIN, 1);
        let mut s = WorkerStats::default();
        s.track(Point::new(ORIGIN + 2, ORIGIN), &p, false);
        assert_eq!(s.ix, 0);
        assert!(s.dx > 0);
    }
}
