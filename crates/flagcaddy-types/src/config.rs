//! Configuration types for flagcaddy.
//!
//! [`FlagcaddyConfig`] is the top-level configuration loaded from
//! `~/.flagcaddy/config.toml`. It controls where records are stored, how the
//! terminal stream is segmented, how aggressively the engine escalates to the
//! advisory tool, and how that tool is invoked.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::FlagcaddyError;

/// Filename for the flagcaddy configuration file.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Filename for the SQLite record store.
pub const DB_FILENAME: &str = "flagcaddy.db";

/// Filename for the log written while a session is wrapped.
pub const LOG_FILENAME: &str = "flagcaddy.log";

/// Default prompt sentinel: an OSC sequence that terminals silently discard.
pub const DEFAULT_SENTINEL: &str = "\x1b]697;flagcaddy-prompt\x07";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlagcaddyConfig {
    /// Directory holding the database, log file, and config file.
    pub data_dir: PathBuf,
    /// Path to the SQLite record store.
    pub db_path: PathBuf,
    /// Terminal capture settings.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Scoring and gating settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// External advisory tool settings.
    #[serde(default)]
    pub advisory: AdvisoryConfig,
}

/// How the wrapped terminal stream is captured and segmented.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Marker the wrapped shell's prompt must end with.
    pub sentinel: String,
    /// Sliding-window cap, as a multiple of the sentinel length.
    pub window_multiple: usize,
    /// Program to wrap when none is given on the command line.
    pub shell: Option<String>,
    /// Size of each read from the pty master or stdin.
    pub read_buffer_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL.to_string(),
            window_multiple: 4,
            shell: None,
            read_buffer_bytes: 4096,
        }
    }
}

/// Novelty threshold, cooldown, and prompt budgets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum novelty score before an advisory call is considered.
    pub novelty_threshold: f64,
    /// Minimum seconds between two advisory calls in one session.
    pub advisory_cooldown_secs: u64,
    /// Maximum number of recent events included in an advisory prompt.
    pub max_batch_events: usize,
    /// Hard character budget for a whole advisory prompt.
    pub max_prompt_chars: usize,
    /// Per-event output truncation inside the advisory prompt.
    pub max_output_chars_per_event: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            novelty_threshold: 0.6,
            advisory_cooldown_secs: 300,
            max_batch_events: 8,
            max_prompt_chars: 12_000,
            max_output_chars_per_event: 1_500,
        }
    }
}

/// How the external advisory tool is invoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Whether advisory calls are made at all.
    pub enabled: bool,
    /// Program to run.
    pub binary: String,
    /// Arguments placed before the prompt.
    pub args: Vec<String>,
    /// Hard wall-clock limit for one call.
    pub timeout_secs: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: "codex".to_string(),
            args: vec!["exec".to_string()],
            timeout_secs: 120,
        }
    }
}

impl AdvisoryConfig {
    /// The call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Immutable settings handed to the recommendation engine at construction.
///
/// Built once from [`FlagcaddyConfig`] so the engine never consults ambient
/// process state while handling events.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub sentinel: String,
    pub novelty_threshold: f64,
    pub advisory_cooldown: Duration,
    pub max_batch_events: usize,
    pub max_prompt_chars: usize,
    pub max_output_chars_per_event: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        FlagcaddyConfig::default_for(Path::new(".flagcaddy")).engine_settings()
    }
}

impl Default for FlagcaddyConfig {
    fn default() -> Self {
        Self::default_for(&default_data_dir())
    }
}

impl FlagcaddyConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, FlagcaddyError> {
        toml::from_str(content).map_err(|e| FlagcaddyError::ConfigError(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, FlagcaddyError> {
        toml::to_string_pretty(self).map_err(|e| FlagcaddyError::ConfigError(e.to_string()))
    }

    /// Create a default configuration rooted at `base_dir`.
    ///
    /// The database lives at `base_dir/flagcaddy.db`.
    pub fn default_for(base_dir: &Path) -> Self {
        Self {
            data_dir: base_dir.to_path_buf(),
            db_path: base_dir.join(DB_FILENAME),
            capture: CaptureConfig::default(),
            engine: EngineConfig::default(),
            advisory: AdvisoryConfig::default(),
        }
    }

    /// Path of the log file used while wrapping a session.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILENAME)
    }

    /// Snapshot the settings the recommendation engine needs.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            sentinel: self.capture.sentinel.clone(),
            novelty_threshold: self.engine.novelty_threshold,
            advisory_cooldown: Duration::from_secs(self.engine.advisory_cooldown_secs),
            max_batch_events: self.engine.max_batch_events,
            max_prompt_chars: self.engine.max_prompt_chars,
            max_output_chars_per_event: self.engine.max_output_chars_per_event,
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), FlagcaddyError> {
        if self.capture.sentinel.is_empty() {
            return Err(FlagcaddyError::ConfigError(
                "capture.sentinel must not be empty".into(),
            ));
        }
        if self.capture.window_multiple < 2 {
            return Err(FlagcaddyError::ConfigError(format!(
                "capture.window_multiple must be at least 2, got {}",
                self.capture.window_multiple
            )));
        }
        if self.capture.read_buffer_bytes == 0 {
            return Err(FlagcaddyError::ConfigError(
                "capture.read_buffer_bytes must be positive".into(),
            ));
        }
        let threshold = self.engine.novelty_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FlagcaddyError::ConfigError(format!(
                "engine.novelty_threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.engine.max_batch_events == 0 || self.engine.max_prompt_chars == 0 {
            return Err(FlagcaddyError::ConfigError(
                "engine.max_batch_events and engine.max_prompt_chars must be positive".into(),
            ));
        }
        if self.advisory.enabled && self.advisory.binary.trim().is_empty() {
            return Err(FlagcaddyError::ConfigError(
                "advisory.binary must be set when advisory is enabled".into(),
            ));
        }
        if self.advisory.timeout_secs == 0 {
            return Err(FlagcaddyError::ConfigError(
                "advisory.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// `$HOME/.flagcaddy`, or `/tmp/.flagcaddy` when `HOME` is unset.
pub fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".flagcaddy")
}
