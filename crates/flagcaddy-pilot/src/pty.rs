//! Pseudo-terminal session management.
//!
//! Spawns the wrapped program in a PTY so every byte it reads or writes
//! passes through the proxy. The master end stays in the parent.

use std::ffi::CString;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::pty::{openpty, Winsize};
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use flagcaddy_types::FlagcaddyError;

/// Exit status used by the child when `exec` fails, matching the shell's
/// "command not found" convention.
pub const EXEC_FAILED_STATUS: i32 = 127;

/// Result of a non-blocking read from the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were read into the buffer.
    Data(usize),
    /// Nothing available right now.
    WouldBlock,
    /// The child closed its side of the terminal (exited).
    Closed,
}

/// A child process running in a pseudo-terminal.
pub struct PtySession {
    master: OwnedFd,
    child_pid: Pid,
}

impl PtySession {
    /// Spawn `argv` in a new PTY.
    ///
    /// `env` is added to and `unset` removed from the inherited environment.
    /// When `size` is given the slave starts with those dimensions. The
    /// master fd is set non-blocking for use with `poll()`.
    pub fn spawn(
        argv: &[String],
        env: &[(String, String)],
        unset: &[String],
        size: Option<Winsize>,
    ) -> Result<Self, FlagcaddyError> {
        let c_args = argv
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FlagcaddyError::CaptureError(format!("invalid argument: {e}")))?;
        let Some(program) = c_args.first().cloned() else {
            return Err(FlagcaddyError::CaptureError("empty command line".into()));
        };

        let pty = openpty(size.as_ref(), None)
            .map_err(|e| FlagcaddyError::CaptureError(format!("openpty failed: {e}")))?;

        // Safety: the child only performs setup syscalls and then execs or exits.
        match unsafe { unistd::fork() } {
            Ok(ForkResult::Child) => {
                // Errors must end in _exit(), never return: returning would run
                // the parent's code path in the child.
                let err = (|| -> Result<(), String> {
                    drop(pty.master);

                    unistd::setsid().map_err(|e| format!("setsid failed: {e}"))?;

                    // Safety: TIOCSCTTY on an fd we own.
                    if unsafe { libc::ioctl(pty.slave.as_raw_fd(), libc::TIOCSCTTY as _, 0) } < 0 {
                        return Err(format!(
                            "TIOCSCTTY failed: {}",
                            std::io::Error::last_os_error()
                        ));
                    }

                    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
                        unistd::dup2(pty.slave.as_raw_fd(), target)
                            .map_err(|e| format!("dup2 {target}: {e}"))?;
                    }
                    drop(pty.slave);

                    for key in unset {
                        std::env::remove_var(key);
                    }
                    for (key, value) in env {
                        std::env::set_var(key, value);
                    }

                    unistd::execvp(&program, &c_args)
                        .map_err(|e| format!("cannot exec {program:?}: {e}"))?;
                    Ok(())
                })();

                if let Err(e) = err {
                    eprintln!("flagcaddy: {e}");
                }
                unsafe { libc::_exit(EXEC_FAILED_STATUS) };
            }
            Ok(ForkResult::Parent { child }) => {
                drop(pty.slave);

                let flags = fcntl(pty.master.as_raw_fd(), FcntlArg::F_GETFL)
                    .map_err(|e| FlagcaddyError::CaptureError(format!("fcntl F_GETFL: {e}")))?;
                let flags = OFlag::from_bits_truncate(flags);
                fcntl(
                    pty.master.as_raw_fd(),
                    FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK),
                )
                .map_err(|e| FlagcaddyError::CaptureError(format!("fcntl F_SETFL: {e}")))?;

                Ok(Self {
                    master: pty.master,
                    child_pid: child,
                })
            }
            Err(e) => Err(FlagcaddyError::CaptureError(format!("fork failed: {e}"))),
        }
    }

    /// Non-blocking read from the master.
    ///
    /// EIO means every slave fd is closed, which Linux reports once the
    /// child has exited; it maps to [`ReadOutcome::Closed`] like EOF.
    pub fn read(&self, buf: &mut [u8]) -> Result<ReadOutcome, FlagcaddyError> {
        match unistd::read(self.master.as_raw_fd(), buf) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(ReadOutcome::WouldBlock),
            Err(Errno::EIO) => Ok(ReadOutcome::Closed),
            Err(e) => Err(FlagcaddyError::CaptureError(format!("pty read: {e}"))),
        }
    }

    /// Write all bytes to the master (the child's terminal input).
    ///
    /// Retries on EAGAIN for up to ~5 seconds so a child that stops
    /// reading cannot wedge the relay loop.
    pub fn write_all(&self, data: &[u8]) -> Result<(), FlagcaddyError> {
        let mut written = 0;
        let mut retries = 0u32;
        while written < data.len() {
            match unistd::write(&self.master, &data[written..]) {
                Ok(n) => {
                    written += n;
                    retries = 0;
                }
                Err(Errno::EAGAIN) | Err(Errno::EINTR) => {
                    retries += 1;
                    if retries > 5000 {
                        return Err(FlagcaddyError::CaptureError(
                            "pty write: buffer full after 5s of retries".into(),
                        ));
                    }
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                Err(e) => return Err(FlagcaddyError::CaptureError(format!("pty write: {e}"))),
            }
        }
        Ok(())
    }

    /// Apply a window size to the terminal; the child receives SIGWINCH.
    pub fn set_winsize(&self, size: &Winsize) -> Result<(), FlagcaddyError> {
        // Safety: TIOCSWINSZ reads a winsize struct from a valid pointer.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, size) };
        if ret < 0 {
            return Err(FlagcaddyError::CaptureError(format!(
                "ioctl TIOCSWINSZ failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Deliver `sig` to the child.
    pub fn signal(&self, sig: Signal) -> Result<(), FlagcaddyError> {
        signal::kill(self.child_pid, sig)
            .map_err(|e| FlagcaddyError::CaptureError(format!("kill {sig}: {e}")))
    }

    /// Wait for the child to exit and return its exit code.
    ///
    /// Returns negative values for signal termination (-signum).
    pub fn wait(&self) -> Result<i32, FlagcaddyError> {
        loop {
            match waitpid(self.child_pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(-(sig as i32)),
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => return Ok(0),
                Err(e) => return Err(FlagcaddyError::CaptureError(format!("waitpid: {e}"))),
            }
        }
    }

    /// Hang up on a child that may still be running and reap it.
    ///
    /// Sends SIGHUP and SIGTERM, then SIGKILL if the child outlives `grace`.
    /// Returns the exit code like [`wait`](Self::wait).
    pub fn terminate(&self, grace: Duration) -> Result<i32, FlagcaddyError> {
        for sig in [Signal::SIGHUP, Signal::SIGTERM] {
            match signal::kill(self.child_pid, sig) {
                Ok(()) => {}
                Err(Errno::ESRCH) => break,
                Err(e) => {
                    return Err(FlagcaddyError::CaptureError(format!("kill {sig}: {e}")));
                }
            }
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            match waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(-(sig as i32)),
                Ok(_) | Err(Errno::EINTR) => std::thread::sleep(Duration::from_millis(20)),
                Err(Errno::ECHILD) => return Ok(0),
                Err(e) => return Err(FlagcaddyError::CaptureError(format!("waitpid: {e}"))),
            }
        }

        let _ = signal::kill(self.child_pid, Signal::SIGKILL);
        self.wait()
    }

    /// The master fd, for poll.
    pub fn master(&self) -> BorrowedFd<'_> {
        self.master.as_fd()
    }

    /// The child's process ID.
    pub fn pid(&self) -> u32 {
        u32::try_from(self.child_pid.as_raw()).unwrap_or(0)
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        // Best effort: terminate a still-running child and reap it.
        if matches!(
            waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)),
            Ok(WaitStatus::StillAlive)
        ) {
            let _ = signal::kill(self.child_pid, Signal::SIGTERM);
            std::thread::sleep(std::time::Duration::from_millis(100));
            let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
        }
    }
}
