//! ANSI escape sequence stripping.
//!
//! Captured output is full of colors, cursor movement, and window-title
//! updates. Fingerprinting and fact extraction work on the visible text only.

/// Strip ANSI escape sequences and carriage returns from `input`.
///
/// Handles:
/// - CSI sequences: `ESC [ ... <final byte>` and the C1 form `U+009B`
/// - OSC sequences: `ESC ] ... ST` (where ST is `ESC \` or BEL)
/// - Two-byte escapes such as `ESC 7` or `ESC M`
///
/// Works on decoded characters, so multi-byte UTF-8 text is never split.
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.next() {
                Some('[') => skip_csi(&mut chars),
                Some(']') => {
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                // two-byte escape, or a dangling ESC at the end
                _ => {}
            },
            '\u{9b}' => skip_csi(&mut chars),
            '\r' => {}
            c => out.push(c),
        }
    }

    out
}

/// Skip parameter and intermediate bytes, then the final byte.
fn skip_csi(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while let Some(&c) = chars.peek() {
        if ('\x20'..='\x3f').contains(&c) {
            chars.next();
        } else {
            break;
        }
    }
    if let Some(&c) = chars.peek() {
        if ('\x40'..='\x7e').contains(&c) {
            chars.next();
        }
    }
}
