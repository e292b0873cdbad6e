//! Session recorder: rebuilds command/output events from a raw byte stream.
//!
//! Input bytes (operator keystrokes) are folded into an edit buffer; a line
//! terminator turns the buffer into the pending command. Output bytes are
//! collected for the pending command until the prompt sentinel appears,
//! which means the command finished and the shell is waiting again.
//!
//! ```text
//!            line closed (non-empty)
//!   Idle ─────────────────────────────▶ Collecting
//!    ▲                                      │
//!    └──────── sentinel seen / flush ───────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

/// A finalized command/output pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub command: String,
    /// Every input byte since the previous line terminator, terminator included.
    pub raw_input: String,
    /// Output captured after the command line, sentinel excluded.
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Receives each finalized event, in order.
pub trait EventSink {
    fn on_event(&mut self, event: CapturedEvent);
}

impl EventSink for Vec<CapturedEvent> {
    fn on_event(&mut self, event: CapturedEvent) {
        self.push(event);
    }
}

const CTRL_C: u8 = 0x03;
const CTRL_U: u8 = 0x15;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
const ESC: u8 = 0x1b;

/// Position inside an escape sequence typed on the input side
/// (arrow keys, function keys). Those bytes never reach the edit buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputEscape {
    None,
    Started,
    Csi,
}

#[derive(Debug)]
enum State {
    Idle,
    Collecting {
        command: String,
        raw_input: String,
        started_at: DateTime<Utc>,
    },
}

/// Line- and sentinel-driven segmentation state machine.
#[derive(Debug)]
pub struct SessionRecorder {
    sentinel: Vec<u8>,
    window_cap: usize,
    state: State,
    edit: Vec<u8>,
    raw_input: Vec<u8>,
    escape: InputEscape,
    output: Vec<u8>,
    /// Always a suffix of `output` while collecting.
    window: Vec<u8>,
}

impl SessionRecorder {
    /// Create a recorder for `sentinel`.
    ///
    /// The sentinel search window holds at most `window_multiple` times the
    /// sentinel length (never less than the sentinel itself).
    pub fn new(sentinel: &str, window_multiple: usize) -> Self {
        let sentinel = sentinel.as_bytes().to_vec();
        let window_cap = sentinel.len().saturating_mul(window_multiple.max(1));
        Self {
            sentinel,
            window_cap,
            state: State::Idle,
            edit: Vec::new(),
            raw_input: Vec::new(),
            escape: InputEscape::None,
            output: Vec::new(),
            window: Vec::new(),
        }
    }

    /// Whether a command is pending.
    pub fn is_collecting(&self) -> bool {
        matches!(self.state, State::Collecting { .. })
    }

    /// The pending command, if any.
    pub fn pending_command(&self) -> Option<&str> {
        match &self.state {
            State::Collecting { command, .. } => Some(command),
            State::Idle => None,
        }
    }

    /// Feed bytes typed by the operator.
    pub fn handle_input(&mut self, data: &[u8]) {
        for &byte in data {
            self.raw_input.push(byte);

            match self.escape {
                InputEscape::Started => {
                    self.escape = if byte == b'[' || byte == b'O' {
                        InputEscape::Csi
                    } else {
                        InputEscape::None
                    };
                    continue;
                }
                InputEscape::Csi => {
                    if (0x40..=0x7e).contains(&byte) {
                        self.escape = InputEscape::None;
                    }
                    continue;
                }
                InputEscape::None => {}
            }

            match byte {
                b'\r' | b'\n' => self.close_line(),
                DELETE | BACKSPACE => pop_char(&mut self.edit),
                CTRL_C | CTRL_U => self.edit.clear(),
                ESC => self.escape = InputEscape::Started,
                b if b < 0x20 => {}
                b => self.edit.push(b),
            }
        }
    }

    fn close_line(&mut self) {
        let line = String::from_utf8_lossy(&self.edit).trim().to_string();
        let raw = String::from_utf8_lossy(&self.raw_input).into_owned();
        self.edit.clear();
        self.raw_input.clear();

        if line.is_empty() {
            return;
        }

        if let Some(previous) = self.pending_command() {
            debug!(previous, replacement = %line, "pending command replaced before prompt returned");
        }
        self.output.clear();
        self.window.clear();
        self.state = State::Collecting {
            command: line,
            raw_input: raw,
            started_at: Utc::now(),
        };
    }

    /// Feed bytes produced by the wrapped program.
    ///
    /// Returns the finalized event when this chunk completed the sentinel.
    /// Output arriving while idle is not recorded.
    pub fn handle_output(&mut self, data: &[u8]) -> Option<CapturedEvent> {
        if !self.is_collecting() || self.sentinel.is_empty() {
            return None;
        }

        self.output.extend_from_slice(data);
        self.window.extend_from_slice(data);

        if let Some(pos) = find(&self.window, &self.sentinel) {
            let cut = self.output.len() - (self.window.len() - pos);
            self.output.truncate(cut);
            return self.finalize();
        }

        if self.window.len() > self.window_cap {
            let excess = self.window.len() - self.window_cap;
            self.window.drain(..excess);
        }
        None
    }

    /// Finalize a pending command without waiting for the sentinel.
    pub fn flush(&mut self) -> Option<CapturedEvent> {
        if self.is_collecting() {
            debug!("flushing pending command without prompt sentinel");
        }
        self.finalize()
    }

    fn finalize(&mut self) -> Option<CapturedEvent> {
        let State::Collecting {
            command,
            raw_input,
            started_at,
        } = std::mem::replace(&mut self.state, State::Idle)
        else {
            return None;
        };

        let output = String::from_utf8_lossy(&self.output).into_owned();
        self.output.clear();
        self.window.clear();

        Some(CapturedEvent {
            command,
            raw_input,
            output,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Remove the last UTF-8 character from `buf`.
fn pop_char(buf: &mut Vec<u8>) {
    while let Some(byte) = buf.pop() {
        if byte & 0xC0 != 0x80 {
            break;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &str = "<<FC>>";

    fn recorder() -> SessionRecorder {
        SessionRecorder::new(SENTINEL, 4)
    }

    #[test]
    fn line_terminator_starts_collecting() {
        let mut rec = recorder();
        rec.handle_input(b"whoami");
        assert!(!rec.is_collecting());
        rec.handle_input(b"\r");
        assert_eq!(rec.pending_command(), Some("whoami"));
    }

    #[test]
    fn sentinel_finalizes_event_without_sentinel_text() {
        let mut rec = recorder();
        rec.handle_input(b"id\r");
        assert!(rec.handle_output(b"id\r\nuid=0(root)\r\n").is_none());
        let event = rec.handle_output(b"root@box# <<FC>>").unwrap();

        assert_eq!(event.command, "id");
        assert_eq!(event.raw_input, "id\r");
        assert_eq!(event.output, "id\r\nuid=0(root)\r\nroot@box# ");
        assert!(event.finished_at >= event.started_at);
        assert!(!rec.is_collecting());
    }

    #[test]
    fn sentinel_split_across_chunks() {
        let mut rec = recorder();
        rec.handle_input(b"ls\n");
        assert!(rec.handle_output(b"a b c\n$ <<F").is_none());
        let event = rec.handle_output(b"C>> trailing").unwrap();
        assert_eq!(event.output, "a b c\n$ ");
    }

    #[test]
    fn window_stays_bounded_without_sentinel() {
        let mut rec = recorder();
        rec.handle_input(b"yes\n");
        for _ in 0..1000 {
            assert!(rec.handle_output(b"y\ny\ny\ny\n").is_none());
        }
        assert!(rec.window.len() <= SENTINEL.len() * 4);
        assert_eq!(rec.output.len(), 8000);
    }

    #[test]
    fn backspace_removes_last_character() {
        let mut rec = recorder();
        rec.handle_input(b"lsx\x7f -la\r");
        assert_eq!(rec.pending_command(), Some("ls -la"));

        let mut rec = recorder();
        rec.handle_input("café\x08e\r".as_bytes());
        assert_eq!(rec.pending_command(), Some("cafe"));
    }

    #[test]
    fn interrupt_resets_edit_buffer_only() {
        let mut rec = recorder();
        rec.handle_input(b"sleep 100\r");
        rec.handle_input(b"half-typed\x03");
        assert_eq!(rec.pending_command(), Some("sleep 100"));
        rec.handle_input(b"\r");
        // the interrupted text never becomes a command
        assert_eq!(rec.pending_command(), Some("sleep 100"));
    }

    #[test]
    fn blank_lines_are_ignored() {
        let mut rec = recorder();
        rec.handle_input(b"   \r\n");
        assert!(!rec.is_collecting());

        rec.handle_input(b"pwd\r\n");
        assert_eq!(rec.pending_command(), Some("pwd"));
    }

    #[test]
    fn arrow_keys_are_filtered() {
        let mut rec = recorder();
        rec.handle_input(b"\x1b[A\x1bOBecho hi\x1b[D\r");
        assert_eq!(rec.pending_command(), Some("echo hi"));
    }

    #[test]
    fn new_line_replaces_pending_command_and_output() {
        let mut rec = recorder();
        rec.handle_input(b"first\r");
        rec.handle_output(b"partial output");
        rec.handle_input(b"second\r");
        let event = rec.handle_output(b"fresh<<FC>>").unwrap();
        assert_eq!(event.command, "second");
        assert_eq!(event.output, "fresh");
    }

    #[test]
    fn output_while_idle_is_ignored() {
        let mut rec = recorder();
        assert!(rec.handle_output(b"banner <<FC>>").is_none());
        rec.handle_input(b"id\r");
        let event = rec.handle_output(b"uid=0<<FC>>").unwrap();
        assert_eq!(event.output, "uid=0");
    }

    #[test]
    fn flush_finalizes_pending_command() {
        let mut rec = recorder();
        assert!(rec.flush().is_none());

        rec.handle_input(b"tail -f log\r");
        rec.handle_output(b"line 1\n");
        let event = rec.flush().unwrap();
        assert_eq!(event.command, "tail -f log");
        assert_eq!(event.output, "line 1\n");
        assert!(rec.flush().is_none());
    }

    #[test]
    fn flush_with_no_output_yields_empty_event() {
        let mut rec = recorder();
        rec.handle_input(b"exit\r");
        let event = rec.flush().unwrap();
        assert_eq!(event.output, "");
    }

    #[test]
    fn raw_input_keeps_edits() {
        let mut rec = recorder();
        rec.handle_input(b"pwdd\x7f\r");
        let event = rec.flush().unwrap();
        assert_eq!(event.command, "pwd");
        assert_eq!(event.raw_input, "pwdd\x7f\r");
    }

    #[test]
    fn vec_sink_collects_events() {
        let mut sink: Vec<CapturedEvent> = Vec::new();
        let mut rec = recorder();
        rec.handle_input(b"id\r");
        if let Some(event) = rec.handle_output(b"ok<<FC>>") {
            sink.on_event(event);
        }
        assert_eq!(sink.len(), 1);
    }
}
