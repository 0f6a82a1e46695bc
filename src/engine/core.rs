//! The engine proper: owns the worker pool and drives the per-generation
//! state machine.
//!
//! ```text
//! SIZE_HASH -> SIZE_ARENA -> RELEASE_ALIVE -> POLL_INPUT -> AWAIT_ALIVE ->
//!   PREP_NEWGRID -> RELEASE_CELLS -> UPDATE_STATS/DISPLAY -> AWAIT_CELLS ->
//!   SLEEP(rate) -> ADJUST_TRACK -> (going?) -> SIZE_HASH
//! ```
//!
//! Headless callers get the same machine through [`SparseLifeEngine::step`]
//! with the input, display and pacing states skipped.

use super::activity::ActivityMap;
use super::alive::AliveSets;
use super::arena::CellArena;
use super::barrier::{GenParams, PhaseBarrier, WorkerStats, WorkerStatsSet, WorkerTask};
use super::hash::{order_for, CellHash};
use super::tracker::{step_increment, ViewState};
use super::worker::worker_loop;
use crate::config::{EngineConfig, ResolvedConfig};
use crate::display::term::{spawn_renderer, ControlEvent, TerminalSession};
use crate::display::{format_status, RenderGate, Screen};
use crate::pattern::Pattern;
use crate::point::Point;
use anyhow::Result;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Everything the worker threads can reach. Field-level access rules are
/// documented on each component; the phase barrier is what turns those
/// rules into actual happens-before edges.
pub(crate) struct EngineShared {
    pub(crate) cfg: ResolvedConfig,
    pub(crate) arena: CellArena,
    pub(crate) hash: CellHash,
    /// Ping-pong activity maps; `GenParams::grid_read` selects the one
    /// read while expanding, the other collects next-generation flags.
    pub(crate) grids: [ActivityMap; 2],
    pub(crate) alive: AliveSets,
    pub(crate) stats: WorkerStatsSet,
    pub(crate) barrier: PhaseBarrier,
    pub(crate) screen: Arc<Screen>,
}

/// Parallel sparse Life engine with static-region skipping.
///
/// See the crate docs for the architecture; the short version is that each
/// generation runs two barrier-separated parallel phases over a shared
/// arena-backed spatial hash, and 4x4 tiles that saw no births or deaths
/// are skipped wholesale.
pub struct SparseLifeEngine {
    shared: Arc<EngineShared>,
    workers: Vec<JoinHandle<()>>,
    cfg: ResolvedConfig,
    generation: u64,
    births: u64,
    deaths: u64,
    /// Live cells retained without evaluation in the last generation.
    statics: u64,
    /// Arena entries of the last generation; feeds next generation's hash
    /// sizing.
    cells_last: usize,
    cells_max: u64,
    /// Population after the last finished generation; the authoritative
    /// count between steps.
    pop: u64,
    /// Which activity map the next expansion phase reads.
    grid_read: usize,
    screen_buf: usize,
    view: ViewState,
    alt_view: ViewState,
    /// Generation rate cap in generations/second, [1, 16384].
    rate: u32,
    rate_capped: bool,
    /// Display stride exponent: render 1 in 2^s generations.
    stride_log2: u32,
    last_recentre: u64,
}

impl SparseLifeEngine {
    /// Build an engine and park its worker pool. Headless: plots go
    /// nowhere until [`run_interactive`](Self::run_interactive) attaches a
    /// terminal.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let cfg = config.resolve()?;
        let initial = cfg.chunk_size * cfg.num_chunks;
        let order = order_for(initial);
        let shared = Arc::new(EngineShared {
            cfg,
            arena: CellArena::new(cfg.threads, initial),
            hash: CellHash::new(order),
            grids: [
                ActivityMap::new(order, cfg.static_mask),
                ActivityMap::new(order, cfg.static_mask),
            ],
            alive: AliveSets::new(cfg.threads, initial / cfg.threads.max(1)),
            stats: WorkerStatsSet::new(cfg.threads),
            barrier: PhaseBarrier::new(),
            screen: Arc::new(Screen::disabled()),
        });

        let workers = (0..cfg.threads)
            .map(|t| {
                let shared = shared.clone();
                std::thread::Builder::new()
                    .name(format!("sparselife-worker-{t}"))
                    .spawn(move || worker_loop(shared, t))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        let view = ViewState::centred_at(cfg.origin, cfg.origin);
        Ok(Self {
            shared,
            workers,
            cfg,
            generation: 0,
            births: 0,
            deaths: 0,
            statics: 0,
            pop: 0,
            cells_last: 0,
            cells_max: 0,
            grid_read: 0,
            screen_buf: 0,
            view,
            alt_view: view,
            rate: 16384,
            rate_capped: false,
            stride_log2: 0,
            last_recentre: 0,
        })
    }

    /// Load a pattern, replacing any existing population.
    ///
    /// Cells are dealt round-robin across the worker alive sets, rotating
    /// every 16 cells so the first generation starts balanced, and every
    /// populated tile is flagged active so the whole pattern is evaluated
    /// once before static regions can settle.
    pub fn load_pattern(&mut self, pattern: &Pattern) -> Result<()> {
        self.load_points(pattern.points());
        Ok(())
    }

    /// Load raw world points; see [`load_pattern`](Self::load_pattern).
    /// Points must be distinct; [`Pattern`] deduplicates on construction.
    pub fn load_points(&mut self, points: &[Point]) {
        let n = self.cfg.threads;
        for t in 0..n {
            unsafe { self.shared.alive.get_mut(t) }.clear();
        }
        for (i, &p) in points.iter().enumerate() {
            unsafe { self.shared.alive.get_mut((i / 16) % n) }.push(p);
        }

        let grid = &self.shared.grids[self.grid_read];
        grid.reset(self.shared.hash.order());
        for &p in points {
            grid.set_active(p);
        }

        self.pop = points.len() as u64;
        self.generation = 0;
        self.births = 0;
        self.deaths = 0;
        self.statics = 0;
        self.cells_last = 0;
        self.cells_max = 0;
        self.last_recentre = 0;

        if let Some((cx, cy)) = centre_of(points) {
            self.view = ViewState::centred_at(cx, cy);
            self.alt_view = self.view;
        }
    }

    /// Gather the current population into a pattern.
    pub fn current_state(&self) -> Pattern {
        Pattern::from_points(self.shared.alive.collect_points())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn population(&self) -> u64 {
        self.pop
    }

    /// Cumulative birth counter. Advisory: with several workers the value
    /// is exact, but its split across generations is not reproducible.
    pub fn births(&self) -> u64 {
        self.births
    }

    pub fn deaths(&self) -> u64 {
        self.deaths
    }

    /// Live cells that were skipped as static in the last generation.
    pub fn static_population(&self) -> u64 {
        self.statics
    }

    /// Whether the tile containing (x, y) is flagged for evaluation in the
    /// next generation. Debug/test introspection.
    pub fn is_tile_active(&self, x: u32, y: u32) -> bool {
        self.shared.grids[self.grid_read].is_active(Point::new(x, y))
    }

    /// Advance one generation.
    pub fn step(&mut self) {
        let params = self.begin_generation(false);
        self.finish_expansion(&params);
        self.finish_generation(&params);
    }

    /// Advance `n` generations.
    pub fn step_n(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    /// SIZE_HASH + SIZE_ARENA + RELEASE_ALIVE.
    fn begin_generation(&mut self, draw: bool) -> GenParams {
        let n = self.cfg.threads;
        let active_est = self.pop.saturating_sub(self.statics) as usize;
        let order = order_for(self.cells_last.max(active_est));
        self.shared.hash.reset(order);

        // Sized so no worker cursor can run off the end (the +10 and eight
        // +1 emissions per evaluated cell, times the stride), with the
        // configured slack absorbing tiles that went active since the
        // static count was taken.
        let capacity =
            active_est * (8 + n) + self.cfg.chunk_size * self.cfg.num_chunks;
        self.shared.arena.ensure_capacity(capacity);

        if draw {
            self.shared.screen.clear(self.screen_buf);
        }

        let params = GenParams {
            grid_read: self.grid_read,
            screen_buf: self.screen_buf,
            draw,
            view_xl: self.view.window_x,
            view_yl: self.view.window_y,
            centre_x: self.view.centre_x,
            centre_y: self.view.centre_y,
            sensitivity: self.view.sensitivity,
            tracking: self.view.tracking,
        };
        self.shared.barrier.release(WorkerTask::ExpandAlive(params), n);
        params
    }

    /// AWAIT_ALIVE + PREP_NEWGRID + RELEASE_CELLS.
    fn finish_expansion(&mut self, params: &GenParams) {
        let n = self.cfg.threads;
        self.shared.barrier.wait_finished();

        let entries = self.shared.arena.entries(n);
        self.cells_last = entries;
        self.cells_max = self.cells_max.max(entries as u64);

        // The next-generation map adopts this generation's hash order; the
        // alive sets grow ahead of time so appends cannot reallocate while
        // the resolution phase runs.
        self.shared.grids[params.grid_read ^ 1].reset(self.shared.hash.order());
        let reserve = entries / (2 * n) + 16;
        for t in 0..n {
            self.shared.alive.reserve(t, reserve);
        }

        self.shared
            .barrier
            .release(WorkerTask::ResolveCells(*params), n);
    }

    /// AWAIT_CELLS + ADJUST_TRACK.
    fn finish_generation(&mut self, params: &GenParams) -> WorkerStats {
        self.shared.barrier.wait_finished();
        let sums = self.shared.stats.sum();
        self.births += sums.births;
        self.deaths += sums.deaths;
        self.statics = sums.statics;
        self.pop = self.shared.alive.population();

        self.generation += 1;
        self.grid_read = params.grid_read ^ 1;

        if self.view.tracking {
            self.view.apply_deltas(&sums, self.rate);
            let (cols, rows) = self.shared.screen.dims();
            self.view.maybe_recentre(
                cols,
                rows,
                self.rate,
                self.generation,
                &mut self.last_recentre,
            );
        }
        sums
    }

    /// Apply one decoded keyboard command.
    fn apply_event(&mut self, event: ControlEvent, going: &mut bool) {
        match event {
            ControlEvent::Nudge(dx, dy) => {
                let inc = step_increment(self.rate) as i32;
                self.view.window_x = self.view.window_x.wrapping_add_signed(dx * inc);
                self.view.window_y = self.view.window_y.wrapping_add_signed(dy * inc);
                let (cols, rows) = self.shared.screen.dims();
                self.view.centre_x = self.view.window_x.wrapping_add(cols / 2);
                self.view.centre_y = self
                    .view
                    .window_y
                    .wrapping_add(rows.saturating_sub(1) / 2);
                self.view.tracking = false;
            }
            ControlEvent::ToggleTracking => self.view.tracking = !self.view.tracking,
            ControlEvent::CycleSensitivity => {
                self.view.sensitivity = self.view.sensitivity % 11 + 1;
            }
            ControlEvent::RateHalve => self.rate = (self.rate / 2).max(1),
            ControlEvent::RateDouble => self.rate = (self.rate * 2).min(16384),
            ControlEvent::DampenHalve => self.view.s_rate = (self.view.s_rate / 2).max(1),
            ControlEvent::DampenDouble => self.view.s_rate = (self.view.s_rate * 2).min(64),
            ControlEvent::StrideDouble => self.stride_log2 = (self.stride_log2 + 1).min(20),
            ControlEvent::StrideHalve => self.stride_log2 = self.stride_log2.saturating_sub(1),
            ControlEvent::SwapView => std::mem::swap(&mut self.view, &mut self.alt_view),
            ControlEvent::Quit => *going = false,
        }
    }

    /// Run interactively until `q`/ESC: raw-mode terminal, renderer thread,
    /// keyboard control, rate pacing.
    pub fn run_interactive(&mut self) -> Result<()> {
        let session = TerminalSession::open()?;
        let (cols, rows) = session.size()?;
        self.shared.screen.resize(cols, rows);
        self.view.frame(cols, rows);
        self.alt_view.frame(cols, rows);

        let gate = Arc::new(RenderGate::new());
        let renderer = spawn_renderer(self.shared.screen.clone(), gate.clone());

        let mut going = true;
        let mut gps = 0u64;
        let mut rate10k = 0u64;
        let mut tick_start = Instant::now();
        let mut tick_gens = 0u64;

        while going {
            let gen_start = Instant::now();

            if let Ok((c, r)) = session.size() {
                if (c, r) != self.shared.screen.dims() && !gate.is_busy() {
                    // Resize only with the renderer idle; both buffers are
                    // reallocated, so the stale snapshot must not be read.
                    self.shared.screen.resize(c, r);
                    self.view.frame(c, r);
                }
            }

            let params = self.begin_generation(true);

            // POLL_INPUT overlaps the expansion phase.
            while let Some(event) = session.poll_event() {
                self.apply_event(event, &mut going);
            }

            self.finish_expansion(&params);

            // UPDATE_STATS/DISPLAY overlaps the resolution phase.
            if self.generation % (1u64 << self.stride_log2) == 0 {
                let (xl, yl) = Point::new(self.view.window_x, self.view.window_y)
                    .rel(self.cfg.origin);
                let status = format_status(
                    self.generation,
                    1u64 << self.stride_log2,
                    self.pop,
                    self.statics,
                    self.births,
                    self.deaths,
                    self.rate_capped,
                    gps,
                    self.shared.hash.order(),
                    self.cells_max,
                    self.view.s_rate,
                    xl,
                    yl,
                    self.view.sensitivity,
                    rate10k,
                );
                self.shared.screen.write_status(self.screen_buf, &status);
                if gate.try_push(self.screen_buf) {
                    self.screen_buf ^= 1;
                }
            }

            self.finish_generation(&params);

            // SLEEP: pace to the rate cap.
            tick_gens += 1;
            let target = Duration::from_secs_f64(1.0 / self.rate as f64);
            let elapsed = gen_start.elapsed();
            if elapsed < target {
                self.rate_capped = true;
                std::thread::sleep(target - elapsed);
            } else {
                self.rate_capped = false;
            }

            let tick = tick_start.elapsed();
            if tick >= Duration::from_millis(500) {
                let per_sec = tick_gens as f64 / tick.as_secs_f64();
                gps = per_sec as u64;
                rate10k = (per_sec * 10_000.0) as u64;
                tick_start = Instant::now();
                tick_gens = 0;
            }
        }

        gate.quit();
        let _ = renderer.join();
        drop(session);
        Ok(())
    }
}

impl crate::traits::LifeEngine for SparseLifeEngine {
    fn load_pattern(&mut self, pattern: &Pattern) -> Result<()> {
        SparseLifeEngine::load_pattern(self, pattern)
    }

    fn current_state(&self) -> Pattern {
        SparseLifeEngine::current_state(self)
    }

    fn step_n(&mut self, generations: u64) {
        SparseLifeEngine::step_n(self, generations)
    }
}

impl Drop for SparseLifeEngine {
    fn drop(&mut self) {
        self.shared.barrier.shutdown(self.cfg.threads);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Midpoint of the population's bounding box, or None when empty.
fn centre_of(points: &[Point]) -> Option<(u32, u32)> {
    let first = points.first()?;
    let (mut min_x, mut max_x) = (first.x, first.x);
    let (mut min_y, mut max_y) = (first.y, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    Some((
        ((min_x as u64 + max_x as u64) / 2) as u32,
        ((min_y as u64 + max_y as u64) / 2) as u32,
    ))
}
