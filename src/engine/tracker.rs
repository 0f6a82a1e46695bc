//! View window and centre-of-activity tracking, main-thread side.
//!
//! Workers accumulate weighted directional deltas while resolving cells
//! (see [`super::barrier::WorkerStats::track`]); after each generation the
//! main thread folds the sums into the tracked centre and occasionally
//! recentres the view window onto it.

use super::barrier::WorkerStats;

/// One view: a window into the world plus the tracking state steering it.
/// The engine keeps a primary and an alternate and can swap them.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ViewState {
    /// Top-left world corner of the window.
    pub window_x: u32,
    pub window_y: u32,
    /// Tracked centre of activity.
    pub centre_x: u32,
    pub centre_y: u32,
    /// Autotracking sensitivity `tg` in [1, 11]; higher values tighten the
    /// neighbourhood that contributes deltas.
    pub sensitivity: u32,
    pub tracking: bool,
    /// Window-move dampening in [1, 64].
    pub s_rate: u32,
}

impl ViewState {
    pub(crate) fn centred_at(x: u32, y: u32) -> Self {
        Self {
            window_x: x,
            window_y: y,
            centre_x: x,
            centre_y: y,
            sensitivity: 1,
            tracking: true,
            s_rate: 8,
        }
    }

    /// Frame the window so its centre sits on (x, y).
    pub(crate) fn frame(&mut self, cols: u32, rows: u32) {
        self.window_x = self.centre_x.wrapping_sub(cols / 2);
        self.window_y = self.centre_y.wrapping_sub(rows.saturating_sub(1) / 2);
    }
}

/// Step size for centre shifts and manual nudges: the slower the rate cap,
/// the larger the step.
#[inline]
pub(crate) fn step_increment(rate: u32) -> u32 {
    (rate + 1).leading_zeros().saturating_sub(16).max(1)
}

/// Smoothing divisor for the recentre cooldown, scaling from 1 at slow
/// rates to 10 at the maximum cap.
#[inline]
fn rate_smoothing(rate: u32) -> u32 {
    1 + 9 * rate.min(16384) / 16384
}

impl ViewState {
    /// Fold one generation's directional sums into the tracked centre.
    pub(crate) fn apply_deltas(&mut self, sums: &WorkerStats, rate: u32) {
        let inc = step_increment(rate);
        if (sums.ix - sums.dx).unsigned_abs() >= inc as u64 {
            if sums.ix > sums.dx {
                self.centre_x = self.centre_x.wrapping_add(inc);
            } else {
                self.centre_x = self.centre_x.wrapping_sub(inc);
            }
        }
        if (sums.iy - sums.dy).unsigned_abs() >= inc as u64 {
            if sums.iy > sums.dy {
                self.centre_y = self.centre_y.wrapping_add(inc);
            } else {
                self.centre_y = self.centre_y.wrapping_sub(inc);
            }
        }
    }

    /// Recentre the window when the tracked centre strays beyond 2/3 of
    /// the half-window, rate-limited by the dampening and the rate cap.
    pub(crate) fn maybe_recentre(
        &mut self,
        cols: u32,
        rows: u32,
        rate: u32,
        gen: u64,
        last_recentre: &mut u64,
    ) {
        if cols == 0 || rows <= 1 {
            return;
        }
        let half_w = cols / 2;
        let half_h = (rows - 1) / 2;
        let dx = self
            .centre_x
            .wrapping_sub(self.window_x.wrapping_add(half_w)) as i32;
        let dy = self
            .centre_y
            .wrapping_sub(self.window_y.wrapping_add(half_h)) as i32;
        let strayed = dx.unsigned_abs() > 2 * half_w / 3 || dy.unsigned_abs() > 2 * half_h / 3;
        if !strayed {
            return;
        }
        let cooldown = (self.s_rate as u64 * rate as u64 / rate_smoothing(rate) as u64).max(1);
        if gen.saturating_sub(*last_recentre) < cooldown {
            return;
        }
        self.frame(cols, rows);
        *last_recentre = gen;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::ORIGIN;

    #[test]
    fn increment_grows_as_rate_shrinks() {
        assert_eq!(step_increment(16384), 1);
        assert_eq!(step_increment(1), 14);
        assert!(step_increment(64) > step_increment(4096));
    }

    #[test]
    fn deltas_below_increment_do_not_move_the_centre() {
        let mut view = ViewState::centred_at(ORIGIN, ORIGIN);
        let sums = WorkerStats {
            ix: 5,
            dx: 5,
            ..Default::default()
        };
        view.apply_deltas(&sums, 16384);
        assert_eq!(view.centre_x, ORIGIN);
    }

    #[test]
    fn eastward_deltas_pull_the_centre_east() {
        let mut view = ViewState::centred_at(ORIGIN, ORIGIN);
        let sums = WorkerStats {
            ix: 100,
            dx: 10,
            ..Default::default()
        };
        view.apply_deltas(&sums, 16384);
        assert_eq!(view.centre_x, ORIGIN + 1);
        assert_eq!(view.centre_y, ORIGIN);
    }

    #[test]
    fn recentre_waits_out_the_cooldown() {
        let mut view = ViewState::centred_at(ORIGIN, ORIGIN);
        let mut last = 0u64;
        // Drag the centre far outside the 2/3 band of an 80x25 window.
        // At rate 1 the cooldown is s_rate * 1 / 1 = 8 generations.
        view.centre_x = ORIGIN + 200;
        view.maybe_recentre(80, 25, 1, 20, &mut last);
        assert_eq!(last, 20, "first recentre is allowed");
        assert_eq!(view.window_x, view.centre_x.wrapping_sub(40));

        view.centre_x = ORIGIN + 400;
        view.maybe_recentre(80, 25, 1, 21, &mut last);
        assert_eq!(last, 20, "second recentre must wait out the cooldown");
    }
}
