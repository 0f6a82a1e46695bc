//! Terminal backend: raw-mode session, snapshot pushing and key decoding.

use super::{RenderGate, Screen};
use anyhow::{Context, Result};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::{cursor, event, execute, queue, style, terminal};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Commands decoded from the keyboard control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// Arrow keys: nudge the view centre and drop out of autotracking.
    Nudge(i32, i32),
    /// `t`: toggle autotracking.
    ToggleTracking,
    /// `T`: cycle the tracking sensitivity through [1, 11].
    CycleSensitivity,
    /// `<` / `>`: halve / double the generation rate cap.
    RateHalve,
    RateDouble,
    /// `[` / `]`: halve / double the window-move dampening.
    DampenHalve,
    DampenDouble,
    /// `+` / `-`: double / halve the display stride 2^s.
    StrideDouble,
    StrideHalve,
    /// `w`: swap primary and alternate view state.
    SwapView,
    /// `q` / ESC: terminate cleanly.
    Quit,
}

fn decode(key: KeyEvent) -> Option<ControlEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Left => Some(ControlEvent::Nudge(-1, 0)),
        KeyCode::Right => Some(ControlEvent::Nudge(1, 0)),
        KeyCode::Up => Some(ControlEvent::Nudge(0, -1)),
        KeyCode::Down => Some(ControlEvent::Nudge(0, 1)),
        KeyCode::Char('t') => Some(ControlEvent::ToggleTracking),
        KeyCode::Char('T') => Some(ControlEvent::CycleSensitivity),
        KeyCode::Char('<') => Some(ControlEvent::RateHalve),
        KeyCode::Char('>') => Some(ControlEvent::RateDouble),
        KeyCode::Char('[') => Some(ControlEvent::DampenHalve),
        KeyCode::Char(']') => Some(ControlEvent::DampenDouble),
        KeyCode::Char('+') => Some(ControlEvent::StrideDouble),
        KeyCode::Char('-') => Some(ControlEvent::StrideHalve),
        KeyCode::Char('w') => Some(ControlEvent::SwapView),
        KeyCode::Char('q') | KeyCode::Esc => Some(ControlEvent::Quit),
        _ => None,
    }
}

/// Raw-mode alternate-screen session; restores the terminal on drop even
/// when the engine unwinds.
pub struct TerminalSession {
    active: bool,
}

impl TerminalSession {
    pub fn open() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw mode")?;
        execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide)
            .context("failed to enter alternate screen")?;
        Ok(Self { active: true })
    }

    pub fn size(&self) -> Result<(u32, u32)> {
        let (cols, rows) = terminal::size().context("failed to query terminal size")?;
        Ok((cols as u32, rows as u32))
    }

    /// Non-blocking poll of the keyboard; decode errors count as no-op.
    pub fn poll_event(&self) -> Option<ControlEvent> {
        match event::poll(Duration::ZERO) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => decode(key),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if self.active {
            let _ = execute!(io::stdout(), cursor::Show, terminal::LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Push one snapshot to the terminal.
fn push_snapshot(out: &mut impl Write, screen: &Screen, buf: usize) -> io::Result<()> {
    // The gate guarantees exclusive access to this buffer until push_done.
    let snap = unsafe { screen.snapshot(buf) };
    for y in 0..snap.rows {
        queue!(
            out,
            cursor::MoveTo(0, y as u16),
            style::Print(String::from_utf8_lossy(snap.row(y)))
        )?;
    }
    out.flush()
}

/// Spawn the renderer thread. It parks on the gate, pushes each offered
/// snapshot and hands the buffer back. A failed push is logged and
/// swallowed; the next offered generation simply tries again.
pub(crate) fn spawn_renderer(screen: Arc<Screen>, gate: Arc<RenderGate>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("sparselife-render".into())
        .spawn(move || {
            let mut out = io::BufWriter::new(io::stdout());
            while let Some(buf) = gate.await_push() {
                if let Err(err) = push_snapshot(&mut out, &screen, buf) {
                    eprintln!("display: snapshot push failed: {err}");
                }
                gate.push_done();
            }
        })
        .expect("failed to spawn renderer thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn decodes_the_control_surface() {
        assert_eq!(decode(key(KeyCode::Char('q'))), Some(ControlEvent::Quit));
        assert_eq!(decode(key(KeyCode::Esc)), Some(ControlEvent::Quit));
        assert_eq!(
            decode(key(KeyCode::Left)),
            Some(ControlEvent::Nudge(-1, 0))
        );
        assert_eq!(
            decode(key(KeyCode::Char('T'))),
            Some(ControlEvent::CycleSensitivity)
        );
        assert_eq!(
            decode(key(KeyCode::Char('+'))),
            Some(ControlEvent::StrideDouble)
        );
        assert_eq!(decode(key(KeyCode::Char('x'))), None);
    }
}
