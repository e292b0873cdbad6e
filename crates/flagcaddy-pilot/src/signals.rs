//! Signal delivery into the relay loop.
//!
//! Handlers only set flags and write a byte to a socket pair. The read end
//! sits in the relay's poll set, so a signal wakes the loop and is handled
//! between reads, never in the middle of one.

use std::io::Read;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::sys::signal::Signal;
use signal_hook::consts::{SIGHUP, SIGTERM, SIGWINCH};
use signal_hook::SigId;

use flagcaddy_types::FlagcaddyError;

/// Flags raised by SIGWINCH, SIGTERM, and SIGHUP, plus a poll wake fd.
pub struct SignalWatch {
    resize: Arc<AtomicBool>,
    term: Arc<AtomicBool>,
    hup: Arc<AtomicBool>,
    wake: UnixStream,
    ids: Vec<SigId>,
}

impl SignalWatch {
    /// Install the handlers. They are removed again when the watch drops.
    pub fn install() -> Result<Self, FlagcaddyError> {
        let (wake, notify) = UnixStream::pair()
            .map_err(|e| FlagcaddyError::CaptureError(format!("signal socketpair: {e}")))?;
        for stream in [&wake, &notify] {
            stream.set_nonblocking(true).map_err(|e| {
                FlagcaddyError::CaptureError(format!("signal socketpair nonblocking: {e}"))
            })?;
        }

        let mut watch = Self {
            resize: Arc::new(AtomicBool::new(false)),
            term: Arc::new(AtomicBool::new(false)),
            hup: Arc::new(AtomicBool::new(false)),
            wake,
            ids: Vec::new(),
        };

        let flags = [
            (SIGWINCH, Arc::clone(&watch.resize)),
            (SIGTERM, Arc::clone(&watch.term)),
            (SIGHUP, Arc::clone(&watch.hup)),
        ];
        for (sig, flag) in flags {
            let id = signal_hook::flag::register(sig, flag)
                .map_err(|e| FlagcaddyError::CaptureError(format!("register signal {sig}: {e}")))?;
            watch.ids.push(id);

            let writer = notify.try_clone().map_err(|e| {
                FlagcaddyError::CaptureError(format!("clone signal socket: {e}"))
            })?;
            let id = signal_hook::low_level::pipe::register(sig, writer)
                .map_err(|e| FlagcaddyError::CaptureError(format!("register signal {sig}: {e}")))?;
            watch.ids.push(id);
        }

        Ok(watch)
    }

    /// Fd that becomes readable whenever a watched signal arrives.
    pub fn wake_fd(&self) -> BorrowedFd<'_> {
        self.wake.as_fd()
    }

    /// Discard queued wake bytes.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        while matches!((&self.wake).read(&mut buf), Ok(n) if n > 0) {}
    }

    /// Whether a resize arrived since the last call.
    pub fn take_resize(&self) -> bool {
        self.resize.swap(false, Ordering::SeqCst)
    }

    /// A termination signal that arrived since the last call, if any.
    pub fn take_termination(&self) -> Option<Signal> {
        if self.term.swap(false, Ordering::SeqCst) {
            Some(Signal::SIGTERM)
        } else if self.hup.swap(false, Ordering::SeqCst) {
            Some(Signal::SIGHUP)
        } else {
            None
        }
    }
}

impl Drop for SignalWatch {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Held by tests that install a watch or raise signals: a raised signal
    /// reaches every watch in the process.
    pub(crate) static SIGNALS: Mutex<()> = Mutex::new(());

    #[test]
    fn raised_resize_sets_flag_and_wakes() {
        let _guard = SIGNALS.lock().unwrap_or_else(|e| e.into_inner());
        let watch = SignalWatch::install().unwrap();
        assert!(!watch.take_resize());

        signal_hook::low_level::raise(SIGWINCH).unwrap();

        assert!(watch.take_resize());
        assert!(!watch.take_resize());

        let mut buf = [0u8; 8];
        let n = (&watch.wake).read(&mut buf).unwrap();
        assert!(n > 0);
        watch.drain();
        assert!(watch.take_termination().is_none());
    }
}
