//! Screen snapshot buffers and the renderer hand-off.
//!
//! The engine never talks to the terminal directly: workers plot live
//! cells into the current snapshot during expansion, the main thread adds
//! the status line, and a dedicated renderer thread pushes finished
//! snapshots while the next generation is already being computed. Two
//! pre-allocated buffers alternate, so the push never blocks the
//! simulation; when the renderer is still busy, the generation is simply
//! not displayed.

pub(crate) mod term;

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

pub(crate) const LIVE_GLYPH: u8 = b'*';

/// One terminal-sized snapshot: row 0 is the status line, the remaining
/// rows map the view window.
pub(crate) struct ScreenBuf {
    pub cols: u32,
    pub rows: u32,
    pub cells: Vec<u8>,
}

impl ScreenBuf {
    fn new(cols: u32, rows: u32) -> Self {
        Self {
            cols,
            rows,
            cells: vec![b' '; (cols * rows) as usize],
        }
    }

    pub(crate) fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.cols) as usize;
        &self.cells[start..start + self.cols as usize]
    }
}

/// The double-buffered screen.
///
/// Buffer ownership rotates: the main thread (and workers in its phase
/// window) own the buffer being filled, the renderer owns the buffer being
/// pushed. The render gate enforces that the two are never the same one.
pub(crate) struct Screen {
    bufs: [UnsafeCell<ScreenBuf>; 2],
}

unsafe impl Sync for Screen {}

impl Screen {
    pub(crate) fn new(cols: u32, rows: u32) -> Self {
        Self {
            bufs: [
                UnsafeCell::new(ScreenBuf::new(cols, rows)),
                UnsafeCell::new(ScreenBuf::new(cols, rows)),
            ],
        }
    }

    /// A zero-sized screen for headless runs; every plot misses the view.
    pub(crate) fn disabled() -> Self {
        Self::new(0, 0)
    }

    pub(crate) fn dims(&self) -> (u32, u32) {
        let buf = unsafe { &*self.bufs[0].get() };
        (buf.cols, buf.rows)
    }

    /// Reallocate both buffers after a terminal resize. Main thread only,
    /// with the renderer idle.
    pub(crate) fn resize(&self, cols: u32, rows: u32) {
        for buf in &self.bufs {
            unsafe { *buf.get() = ScreenBuf::new(cols, rows) };
        }
    }

    /// Blank buffer `i` ahead of a generation. Main thread only.
    pub(crate) fn clear(&self, i: usize) {
        let buf = unsafe { &mut *self.bufs[i].get() };
        buf.cells.fill(b' ');
    }

    /// Plot a live cell. Called concurrently by workers; every worker owns
    /// disjoint cells (the live sets are disjoint), so the raw writes never
    /// overlap.
    #[inline]
    pub(crate) fn plot(&self, i: usize, col: u32, row: u32) {
        let buf = self.bufs[i].get();
        unsafe {
            let idx = (row * (*buf).cols + col) as usize;
            *(*buf).cells.as_mut_ptr().add(idx) = LIVE_GLYPH;
        }
    }

    /// Write the status line into row 0 of buffer `i`, truncated to the
    /// buffer width. Main thread only.
    pub(crate) fn write_status(&self, i: usize, status: &str) {
        let buf = unsafe { &mut *self.bufs[i].get() };
        let cols = buf.cols as usize;
        if cols == 0 || buf.rows == 0 {
            return;
        }
        let row = &mut buf.cells[..cols];
        row.fill(b' ');
        let bytes = status.as_bytes();
        let n = bytes.len().min(cols);
        row[..n].copy_from_slice(&bytes[..n]);
    }

    /// # Safety
    ///
    /// The caller must hold the render gate for buffer `i`.
    pub(crate) unsafe fn snapshot(&self, i: usize) -> &ScreenBuf {
        &*self.bufs[i].get()
    }
}

/// Hand-off gate between the main thread and the renderer.
///
/// Main offers a finished buffer index only when the renderer is idle; the
/// renderer clears the busy flag once the push completed. A failed offer
/// just skips this generation's display.
pub(crate) struct RenderGate {
    slot: Mutex<RenderSlot>,
    offered: Condvar,
    busy: AtomicBool,
}

struct RenderSlot {
    buf: Option<usize>,
    quit: bool,
}

impl RenderGate {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(RenderSlot {
                buf: None,
                quit: false,
            }),
            offered: Condvar::new(),
            busy: AtomicBool::new(false),
        }
    }

    /// Offer buffer `i` to the renderer; returns false when the renderer
    /// is still pushing the previous snapshot.
    pub(crate) fn try_push(&self, i: usize) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        let mut slot = self.slot.lock().unwrap();
        slot.buf = Some(i);
        self.offered.notify_one();
        true
    }

    /// Park the renderer until a buffer is offered; `None` means quit.
    pub(crate) fn await_push(&self) -> Option<usize> {
        let mut slot = self.slot.lock().unwrap();
        loop {
            if slot.quit {
                return None;
            }
            if let Some(i) = slot.buf.take() {
                return Some(i);
            }
            slot = self.offered.wait(slot).unwrap();
        }
    }

    /// Renderer marks the push complete, releasing the buffer back.
    pub(crate) fn push_done(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Whether the renderer currently holds a buffer.
    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn quit(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.quit = true;
        self.offered.notify_one();
    }
}

/// Format the status line for row 0.
///
/// Field order and spacing are part of the surface contract and pinned by
/// a test below.
#[allow(clippy::too_many_arguments)]
pub(crate) fn format_status(
    gen: u64,
    stride: u64,
    pop: u64,
    statics: u64,
    births: u64,
    deaths: u64,
    capped: bool,
    gps: u64,
    order: u32,
    cells_max: u64,
    s_rate: u32,
    view_x: i32,
    view_y: i32,
    sensitivity: u32,
    rate10k: u64,
) -> String {
    format!(
        "generation {}({}) population {}({}) births {} deaths {} rate{}{} heap({}) {} window({}) {},{} \u{b1}{} {}",
        gen,
        stride,
        pop,
        pop - statics,
        births,
        deaths,
        if capped { '>' } else { ' ' },
        gps,
        order,
        cells_max,
        s_rate,
        view_x,
        view_y,
        1u32 << (23 - sensitivity.min(11)),
        rate10k,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_layout_is_stable() {
        let line = format_status(
            1103, 4, 116, 40, 1200, 1150, true, 950, 8, 7000, 8, -12, 30, 5, 9500000,
        );
        assert_eq!(
            line,
            "generation 1103(4) population 116(76) births 1200 deaths 1150 rate>950 heap(8) 7000 window(8) -12,30 \u{b1}262144 9500000"
        );
    }

    #[test]
    fn uncapped_rate_renders_a_space() {
        let line = format_status(1, 1, 3, 0, 2, 2, false, 10, 6, 30, 8, 0, 0, 1, 100000);
        assert!(line.contains("rate 10 "));
    }

    #[test]
    fn plot_and_status_share_a_buffer() {
        let screen = Screen::new(10, 3);
        screen.clear(0);
        screen.plot(0, 4, 1);
        screen.write_status(0, "gen 1");
        let snap = unsafe { screen.snapshot(0) };
        assert_eq!(&snap.row(0)[..5], b"gen 1");
        assert_eq!(snap.row(1)[4], LIVE_GLYPH);
        assert_eq!(snap.row(2)[4], b' ');
    }

    #[test]
    fn render_gate_rejects_double_offer() {
        let gate = RenderGate::new();
        assert!(gate.try_push(0));
        assert!(!gate.try_push(1));
        assert_eq!(gate.await_push(), Some(0));
        gate.push_done();
        assert!(gate.try_push(1));
    }
}
