//! Layered configuration loading.
//!
//! The priority chain (later overrides earlier):
//! 1. Built-in defaults ([`FlagcaddyConfig::default()`])
//! 2. User-level: `~/.flagcaddy/config.toml`
//! 3. `FLAGCADDY_*` environment variables
//!
//! Layers are merged as `toml::Value` trees so a file only needs to name the
//! keys it changes.

use std::path::{Path, PathBuf};

use crate::config::{default_data_dir, FlagcaddyConfig, CONFIG_FILENAME};
use crate::FlagcaddyError;

/// Maximum config file size in bytes.
const MAX_CONFIG_FILE_SIZE: u64 = 256 * 1024;

/// Known environment variable mappings.
pub struct EnvMapping {
    /// Environment variable name.
    pub env_var: &'static str,
    /// Dot-separated TOML path segments.
    pub toml_path: &'static [&'static str],
}

/// All supported `FLAGCADDY_*` environment variable mappings.
pub const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        env_var: "FLAGCADDY_DB_PATH",
        toml_path: &["db_path"],
    },
    EnvMapping {
        env_var: "FLAGCADDY_CODEX_EXEC",
        toml_path: &["advisory", "binary"],
    },
    // Nested fields (double underscore = nesting)
    EnvMapping {
        env_var: "FLAGCADDY_ADVISORY__ENABLED",
        toml_path: &["advisory", "enabled"],
    },
    EnvMapping {
        env_var: "FLAGCADDY_ADVISORY__TIMEOUT_SECS",
        toml_path: &["advisory", "timeout_secs"],
    },
    EnvMapping {
        env_var: "FLAGCADDY_ENGINE__NOVELTY_THRESHOLD",
        toml_path: &["engine", "novelty_threshold"],
    },
    EnvMapping {
        env_var: "FLAGCADDY_ENGINE__COOLDOWN_SECS",
        toml_path: &["engine", "advisory_cooldown_secs"],
    },
];

/// Loads the effective configuration from defaults, file, and environment.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Override for the user config path (for testing).
    user_config_path: Option<PathBuf>,
    /// Override for the data directory the defaults are rooted at.
    data_dir: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader with default paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the user config file path.
    #[must_use]
    pub fn with_user_path(mut self, path: PathBuf) -> Self {
        self.user_config_path = Some(path);
        self
    }

    /// Root the built-in defaults at `dir` instead of `~/.flagcaddy`.
    #[must_use]
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    /// The config file this loader reads, whether or not it exists.
    pub fn user_path(&self) -> PathBuf {
        self.user_config_path
            .clone()
            .unwrap_or_else(|| self.base_dir().join(CONFIG_FILENAME))
    }

    fn base_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Load, merge, and validate the configuration.
    pub fn load(&self) -> Result<FlagcaddyConfig, FlagcaddyError> {
        let defaults = FlagcaddyConfig::default_for(&self.base_dir());
        let mut merged = toml::Value::try_from(&defaults).map_err(|e| {
            FlagcaddyError::ConfigError(format!("failed to serialize defaults: {e}"))
        })?;

        let user_path = self.user_path();
        if user_path.exists() {
            let content = read_config_file(&user_path)?;
            let layer: toml::Value = toml::from_str(&content).map_err(|e| {
                FlagcaddyError::ConfigError(format!(
                    "invalid config {}: {e}",
                    user_path.display()
                ))
            })?;
            deep_merge(&mut merged, &layer);
        }

        apply_env_overrides(&mut merged)?;

        let config: FlagcaddyConfig = merged.try_into().map_err(|e| {
            FlagcaddyError::ConfigError(format!("failed to parse merged config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Read a config file with a size limit and a null-byte check.
fn read_config_file(path: &Path) -> Result<String, FlagcaddyError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        FlagcaddyError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(FlagcaddyError::ConfigError(format!(
            "config file {} exceeds maximum size of {MAX_CONFIG_FILE_SIZE} bytes",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        FlagcaddyError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;
    if content.contains('\0') {
        return Err(FlagcaddyError::ConfigError(format!(
            "config file {} contains null bytes",
            path.display()
        )));
    }
    Ok(content)
}

/// Deep-merge `overlay` into `base`. Tables merge field-by-field; arrays and
/// scalars are replaced wholesale.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

fn apply_env_overrides(merged: &mut toml::Value) -> Result<(), FlagcaddyError> {
    for mapping in ENV_MAPPINGS {
        if let Ok(raw) = std::env::var(mapping.env_var) {
            validate_env_value(mapping.env_var, &raw)?;
            let value = env_value_to_toml(mapping, &raw)?;
            set_nested_value(merged, mapping.toml_path, value);
        }
    }
    Ok(())
}

fn validate_env_value(var_name: &str, value: &str) -> Result<(), FlagcaddyError> {
    if let Some(ch) = value.chars().find(|c| c.is_control() && *c != '\t') {
        return Err(FlagcaddyError::ConfigError(format!(
            "environment variable {var_name} contains control character U+{:04X}",
            ch as u32
        )));
    }
    Ok(())
}

/// Convert an environment string to the TOML type of its target field.
fn env_value_to_toml(mapping: &EnvMapping, raw: &str) -> Result<toml::Value, FlagcaddyError> {
    let field = mapping.toml_path.last().copied().unwrap_or_default();
    let var = mapping.env_var;
    match field {
        "enabled" => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(toml::Value::Boolean(true)),
            "0" | "false" | "no" | "off" | "" => Ok(toml::Value::Boolean(false)),
            other => Err(FlagcaddyError::ConfigError(format!(
                "environment variable {var} must be a boolean, got {other:?}"
            ))),
        },
        "timeout_secs" | "advisory_cooldown_secs" => {
            let n: i64 = raw.trim().parse().map_err(|e| {
                FlagcaddyError::ConfigError(format!("environment variable {var} must be numeric: {e}"))
            })?;
            Ok(toml::Value::Integer(n))
        }
        "novelty_threshold" => {
            let f: f64 = raw.trim().parse().map_err(|e| {
                FlagcaddyError::ConfigError(format!("environment variable {var} must be a number: {e}"))
            })?;
            Ok(toml::Value::Float(f))
        }
        _ => Ok(toml::Value::String(raw.to_string())),
    }
}

/// Set a value at a nested path, creating intermediate tables as needed.
fn set_nested_value(root: &mut toml::Value, path: &[&str], value: toml::Value) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    if let toml::Value::Table(table) = root {
        if rest.is_empty() {
            table.insert(head.to_string(), value);
        } else {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
            set_nested_value(entry, rest, value);
        }
    }
}
