//! Content fingerprints for duplicate detection.
//!
//! Output is canonicalized before hashing so cosmetic differences (colors,
//! target addresses, timestamps, counters) collapse to one fingerprint.

use regex::Regex;
use sha2::{Digest, Sha256};

use flagcaddy_pilot::strip_ansi;
use flagcaddy_types::FlagcaddyError;

/// Separator between the normalized command and the canonical output.
const FIELD_SEPARATOR: &str = "\n--\n";

/// Computes fingerprints for command/output pairs.
pub struct Fingerprinter {
    sentinel: String,
    ipv4: Regex,
    long_digits: Regex,
    whitespace: Regex,
}

impl Fingerprinter {
    /// Build a fingerprinter that also trims anything from `sentinel` on.
    pub fn new(sentinel: &str) -> Result<Self, FlagcaddyError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                FlagcaddyError::ExtractError(format!("invalid fingerprint pattern {pattern:?}: {e}"))
            })
        };
        Ok(Self {
            sentinel: sentinel.to_string(),
            ipv4: compile(r"\b(?:\d{1,3}\.){3}\d{1,3}\b")?,
            long_digits: compile(r"\d{4,}")?,
            whitespace: compile(r"\s+")?,
        })
    }

    /// Collapse whitespace, trim, and lowercase.
    pub fn normalize_command(&self, command: &str) -> String {
        self.whitespace
            .replace_all(command.trim(), " ")
            .to_lowercase()
    }

    /// Canonical form of captured output.
    ///
    /// Steps: cut at the sentinel, strip escape sequences and carriage
    /// returns, replace IPv4 addresses with `<ip>` and runs of four or more
    /// digits with `<num>`, collapse whitespace, lowercase.
    pub fn canonicalize_output(&self, output: &str) -> String {
        let visible = if self.sentinel.is_empty() {
            output
        } else {
            output
                .find(self.sentinel.as_str())
                .map_or(output, |pos| &output[..pos])
        };
        let text = strip_ansi(visible);
        let text = self.ipv4.replace_all(&text, "<ip>");
        let text = self.long_digits.replace_all(&text, "<num>");
        self.whitespace
            .replace_all(text.trim(), " ")
            .to_lowercase()
    }

    /// Hex-encoded SHA-256 over the normalized command and canonical output.
    pub fn fingerprint(&self, command: &str, output: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.normalize_command(command).as_bytes());
        hasher.update(FIELD_SEPARATOR.as_bytes());
        hasher.update(self.canonicalize_output(output).as_bytes());
        hex::encode(hasher.finalize())
    }
}
