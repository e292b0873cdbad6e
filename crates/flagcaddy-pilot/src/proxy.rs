//! The PTY proxy: relays the operator's terminal to a wrapped program and
//! taps both directions into a [`SessionRecorder`].
//!
//! The relay is a single-threaded `poll()` loop over the pty master, the
//! input fd, and the signal wake fd. Finalized events are handed to the
//! [`EventSink`] inline, before the loop resumes copying bytes.

use std::io::Write;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::pty::Winsize;
use nix::sys::signal::Signal;
use nix::unistd;
use tracing::{debug, info, warn};

use flagcaddy_types::{CaptureConfig, FlagcaddyError, SessionName};

use crate::prompt::prompt_env;
use crate::pty::{PtySession, ReadOutcome};
use crate::recorder::{CapturedEvent, EventSink, SessionRecorder};
use crate::signals::SignalWatch;
use crate::terminal::{current_winsize, RawModeGuard};

/// End-of-file character sent to the child when the input side closes.
const VEOF: u8 = 0x04;

/// How long a child gets to exit after a hangup before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Why the relay loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayEnd {
    /// The child closed its terminal.
    ChildClosed,
    /// Reading from the child failed; it may still be running.
    ReadFailed,
}

/// Wrap `argv` on the real terminal until it exits.
///
/// Returns the child's exit code (negative signal number when killed).
/// Only pty, terminal, or signal setup failures are returned as errors.
pub fn start(
    capture: &CaptureConfig,
    session: &SessionName,
    argv: &[String],
    sink: &mut dyn EventSink,
) -> Result<i32, FlagcaddyError> {
    let raw_mode = RawModeGuard::acquire()?;
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    let result = start_with_io(capture, session, argv, stdin.as_fd(), &mut stdout, sink);
    drop(raw_mode);
    result
}

/// Like [`start`], but reading operator input from `input` and writing the
/// child's output to `output`. The caller owns terminal mode.
pub fn start_with_io(
    capture: &CaptureConfig,
    session: &SessionName,
    argv: &[String],
    input: BorrowedFd<'_>,
    output: &mut dyn Write,
    sink: &mut dyn EventSink,
) -> Result<i32, FlagcaddyError> {
    let program = argv
        .first()
        .ok_or_else(|| FlagcaddyError::CaptureError("no command to wrap".into()))?;
    let env = prompt_env(program, &capture.sentinel, session);
    let pty = PtySession::spawn(argv, &env.set, &env.unset, current_winsize())?;
    info!(session = %session, program, pid = pty.pid(), "wrapped program started");

    let signals = SignalWatch::install()?;
    let mut recorder = SessionRecorder::new(&capture.sentinel, capture.window_multiple);

    let mut relay = Relay {
        pty: &pty,
        signals: &signals,
        recorder: &mut recorder,
        sink,
        output,
        output_failed: false,
        winsize: current_winsize,
    };
    let outcome = relay.run(input, capture.read_buffer_bytes.max(1));

    // Exactly one flush, whichever way the loop ended.
    if let Some(event) = relay.recorder.flush() {
        deliver(relay.sink, event);
    }
    drop(relay);
    drop(signals);

    let code = match &outcome {
        Ok(RelayEnd::ChildClosed) => pty.wait()?,
        Ok(RelayEnd::ReadFailed) | Err(_) => {
            warn!(pid = pty.pid(), "relay ended early; hanging up on wrapped program");
            pty.terminate(TERMINATE_GRACE)?
        }
    };
    info!(session = %session, exit_code = code, "wrapped program exited");
    outcome.map(|_| code)
}

fn deliver(sink: &mut dyn EventSink, event: CapturedEvent) {
    debug!(command = %event.command, bytes = event.output.len(), "event finalized");
    sink.on_event(event);
}

struct Relay<'a> {
    pty: &'a PtySession,
    signals: &'a SignalWatch,
    recorder: &'a mut SessionRecorder,
    sink: &'a mut dyn EventSink,
    output: &'a mut dyn Write,
    output_failed: bool,
    winsize: fn() -> Option<Winsize>,
}

impl Relay<'_> {
    fn run(&mut self, input: BorrowedFd<'_>, buf_size: usize) -> Result<RelayEnd, FlagcaddyError> {
        let mut buf = vec![0u8; buf_size];
        let mut input_open = true;

        loop {
            self.handle_signals();

            let mut fds = vec![
                PollFd::new(self.pty.master(), PollFlags::POLLIN),
                PollFd::new(self.signals.wake_fd(), PollFlags::POLLIN),
            ];
            if input_open {
                fds.push(PollFd::new(input, PollFlags::POLLIN));
            }

            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(FlagcaddyError::CaptureError(format!("poll: {e}"))),
            }

            let ready = |fd: &PollFd<'_>| {
                fd.revents().is_some_and(|r| {
                    r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
                })
            };
            let master_ready = ready(&fds[0]);
            let wake_ready = ready(&fds[1]);
            let input_ready = fds.get(2).is_some_and(ready);
            drop(fds);

            if wake_ready {
                self.signals.drain();
            }

            if master_ready {
                if let Some(end) = self.pump_output(&mut buf) {
                    return Ok(end);
                }
            }

            if input_ready {
                input_open = self.pump_input(input, &mut buf)?;
            }
        }
    }

    /// Copy one chunk from the child. Returns `Some` once the relay must stop.
    fn pump_output(&mut self, buf: &mut [u8]) -> Option<RelayEnd> {
        match self.pty.read(buf) {
            Ok(ReadOutcome::Data(n)) => {
                let chunk = &buf[..n];
                self.write_output(chunk);
                if let Some(event) = self.recorder.handle_output(chunk) {
                    deliver(self.sink, event);
                }
                None
            }
            Ok(ReadOutcome::WouldBlock) => None,
            Ok(ReadOutcome::Closed) => {
                debug!("pty closed");
                Some(RelayEnd::ChildClosed)
            }
            Err(e) => {
                warn!(error = %e, "pty read failed; ending relay");
                Some(RelayEnd::ReadFailed)
            }
        }
    }

    /// Copy one chunk of operator input. Returns whether input stays open.
    fn pump_input(&mut self, input: BorrowedFd<'_>, buf: &mut [u8]) -> Result<bool, FlagcaddyError> {
        match unistd::read(input.as_raw_fd(), buf) {
            Ok(0) => {
                debug!("input closed; sending EOF to child");
                if let Err(e) = self.pty.write_all(&[VEOF]) {
                    warn!(error = %e, "failed to forward EOF");
                }
                Ok(false)
            }
            Ok(n) => {
                let chunk = &buf[..n];
                if let Err(e) = self.pty.write_all(chunk) {
                    warn!(error = %e, "pty write failed; input dropped");
                }
                self.recorder.handle_input(chunk);
                Ok(true)
            }
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(true),
            Err(e) => {
                warn!(error = %e, "input read failed; no longer reading input");
                Ok(false)
            }
        }
    }

    fn write_output(&mut self, chunk: &[u8]) {
        let result = self.output.write_all(chunk).and_then(|()| self.output.flush());
        if let Err(e) = result {
            if !self.output_failed {
                warn!(error = %e, "cannot write to terminal; output still recorded");
                self.output_failed = true;
            }
        }
    }

    fn handle_signals(&mut self) {
        if self.signals.take_resize() {
            if let Some(size) = (self.winsize)() {
                debug!(rows = size.ws_row, cols = size.ws_col, "propagating resize");
                if let Err(e) = self.pty.set_winsize(&size) {
                    warn!(error = %e, "resize failed");
                }
            }
        }

        if let Some(sig) = self.signals.take_termination() {
            info!(signal = %sig, "forwarding termination to wrapped program");
            // interactive shells ignore SIGTERM but exit on hangup
            let mut forward = vec![sig];
            if sig != Signal::SIGHUP {
                forward.push(Signal::SIGHUP);
            }
            for sig in forward {
                if let Err(e) = self.pty.signal(sig) {
                    warn!(error = %e, "failed to forward signal");
                }
            }
        }
    }
}
