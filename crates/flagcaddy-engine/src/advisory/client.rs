//! External advisory tool invocation.
//!
//! [`AdvisoryClient::run`] never fails: a missing binary, a timeout, or a
//! non-zero exit all come back as diagnostic text that the engine stores
//! as the recommendation body.

use std::io::{ErrorKind, Read};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use flagcaddy_types::AdvisoryConfig;

/// Interval between exit checks while waiting on the advisory process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Text-in, text-out advisory capability.
pub trait AdvisoryClient {
    fn enabled(&self) -> bool;

    /// Run one advisory call. Failures are returned as diagnostic text.
    fn run(&self, prompt: &str) -> String;
}

/// Advisory client used when advisory calls are turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAdvisor;

impl AdvisoryClient for DisabledAdvisor {
    fn enabled(&self) -> bool {
        false
    }

    fn run(&self, _prompt: &str) -> String {
        "advisory calls are disabled".to_string()
    }
}

/// Runs `<binary> <args..> <prompt>` and returns its stdout.
///
/// The tool runs in its own process group. Whatever is left of that group
/// is killed once the tool exits or the timeout passes, and reading its
/// pipes never outlasts the timeout.
#[derive(Debug, Clone)]
pub struct CodexAdvisor {
    binary: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CodexAdvisor {
    pub fn new(config: &AdvisoryConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
        }
    }

    fn spawn(&self, prompt: &str) -> std::io::Result<Child> {
        Command::new(&self.binary)
            .args(&self.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
    }

    fn timed_out(&self) -> String {
        warn!(timeout_secs = self.timeout.as_secs(), "advisory call timed out");
        format!("advisory call timed out after {}s", self.timeout.as_secs())
    }
}

impl AdvisoryClient for CodexAdvisor {
    fn enabled(&self) -> bool {
        true
    }

    fn run(&self, prompt: &str) -> String {
        let deadline = Instant::now() + self.timeout;
        let mut child = match self.spawn(prompt) {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(binary = %self.binary, "advisory binary not found");
                return format!("advisory binary not found: {}", self.binary);
            }
            Err(e) => {
                warn!(binary = %self.binary, error = %e, "advisory spawn failed");
                return format!("advisory call failed to start: {e}");
            }
        };
        let group = Pid::from_raw(i32::try_from(child.id()).unwrap_or(0));

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match wait_until(&mut child, group, deadline) {
            WaitOutcome::Exited(status) => status,
            WaitOutcome::TimedOut => return self.timed_out(),
            WaitOutcome::Failed(e) => {
                warn!(error = %e, "waiting on advisory call failed");
                return format!("advisory call failed: {e}");
            }
        };
        // Helpers the tool left behind would otherwise hold the pipes open.
        kill_group(group);

        let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline))
        else {
            return self.timed_out();
        };

        if status.success() {
            return stdout.trim().to_string();
        }
        let code = status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        warn!(exit = %code, "advisory call failed");
        format!("advisory call failed (exit {code}): {}", stderr.trim())
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
    Failed(std::io::Error),
}

/// Wait for `child`, killing its whole process group once `deadline` passes.
fn wait_until(child: &mut Child, group: Pid, deadline: Instant) -> WaitOutcome {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return WaitOutcome::Exited(status),
            Ok(None) if Instant::now() >= deadline => {
                kill_group(group);
                let _ = child.kill();
                let _ = child.wait();
                return WaitOutcome::TimedOut;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill_group(group);
                let _ = child.kill();
                let _ = child.wait();
                return WaitOutcome::Failed(e);
            }
        }
    }
}

/// SIGKILL every process left in `group`. An empty group is not an error.
fn kill_group(group: Pid) {
    if group.as_raw() <= 1 {
        return;
    }
    match killpg(group, Signal::SIGKILL) {
        Ok(()) => debug!(pgid = group.as_raw(), "killed advisory process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = group.as_raw(), error = %e, "failed to kill advisory process group"),
    }
}

/// Read `pipe` to the end on a detached thread.
///
/// The thread is never joined: a process outside the group may still hold
/// the pipe, and the caller only waits as long as its deadline allows.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// The drained text, or `None` if it did not arrive before `deadline`.
fn collect(rx: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(rx) = rx else {
        return Some(String::new());
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(text) => Some(text),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advisor(binary: &str, args: &[&str], timeout_secs: u64) -> CodexAdvisor {
        CodexAdvisor::new(&AdvisoryConfig {
            enabled: true,
            binary: binary.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs,
        })
    }

    #[test]
    fn missing_binary_is_a_diagnostic() {
        let out = advisor("/nonexistent/flagcaddy-advisor", &[], 5).run("hi");
        assert_eq!(out, "advisory binary not found: /nonexistent/flagcaddy-advisor");
    }

    #[test]
    fn stdout_is_returned_trimmed() {
        let out = advisor("echo", &["next:"], 5).run("scan all ports");
        assert_eq!(out, "next: scan all ports");
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let out = advisor("sh", &["-c", "echo boom >&2; exit 3"], 5).run("ignored");
        assert_eq!(out, "advisory call failed (exit 3): boom");
    }

    #[test]
    fn slow_call_times_out() {
        let started = Instant::now();
        let out = advisor("sh", &["-c", "exec sleep 5"], 1).run("ignored");
        assert_eq!(out, "advisory call timed out after 1s");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn background_helper_does_not_outlive_timeout() {
        let started = Instant::now();
        let out = advisor("sh", &["-c", "sleep 8 & echo hi"], 1).run("ignored");
        assert_eq!(out, "hi");
        assert!(
            started.elapsed() < Duration::from_secs(4),
            "run took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn disabled_advisor_reports_disabled() {
        assert!(!DisabledAdvisor.enabled());
        assert!(advisor("echo", &[], 1).enabled());
    }
}
