//! Terminal capture for flagcaddy.
//!
//! Runs the operator's shell inside a pseudo-terminal, relays it
//! transparently, and segments the byte stream into command/output events
//! using a sentinel embedded in the shell prompt.
//!
//! # Architecture
//!
//! - [`pty::PtySession`]: the child process in a pseudo-terminal
//! - [`recorder::SessionRecorder`]: idle/collecting segmentation state machine
//! - [`prompt`]: child environment that puts the sentinel at the end of the prompt
//! - [`signals::SignalWatch`]: resize and termination signals as poll wakeups
//! - [`terminal`]: raw-mode guard and window size of the real terminal
//! - [`ansi`]: ANSI escape sequence stripping
//! - [`proxy`]: the relay loop tying the pieces together

pub mod ansi;
pub mod prompt;
pub mod proxy;
pub mod pty;
pub mod recorder;
pub mod signals;
pub mod terminal;

pub use ansi::strip_ansi;
pub use prompt::{prompt_env, ChildEnv, ShellKind};
pub use proxy::{start, start_with_io};
pub use pty::{PtySession, ReadOutcome};
pub use recorder::{CapturedEvent, EventSink, SessionRecorder};
