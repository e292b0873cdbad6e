//! The operator's real terminal: raw mode and window size.

use std::io::IsTerminal;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use nix::pty::Winsize;
use tracing::{debug, warn};

use flagcaddy_types::FlagcaddyError;

/// Puts the controlling terminal in raw mode and restores it on drop.
///
/// Does nothing when stdin is not a terminal (piped input, tests), so the
/// proxy can still relay bytes without a tty.
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn acquire() -> Result<Self, FlagcaddyError> {
        if !std::io::stdin().is_terminal() {
            debug!("stdin is not a terminal; leaving terminal mode alone");
            return Ok(Self { active: false });
        }
        enable_raw_mode()
            .map_err(|e| FlagcaddyError::CaptureError(format!("cannot enter raw mode: {e}")))?;
        Ok(Self { active: true })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = disable_raw_mode() {
                warn!(error = %e, "failed to restore terminal mode");
            }
        }
    }
}

/// Size of the operator's terminal, if stdout is one.
pub fn current_winsize() -> Option<Winsize> {
    if !std::io::stdout().is_terminal() {
        return None;
    }
    let (cols, rows) = crossterm::terminal::size().ok()?;
    Some(Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    })
}
