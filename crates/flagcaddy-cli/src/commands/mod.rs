//! CLI command implementations for the `flagcaddy` binary.

pub mod config;
pub mod events;
pub mod facts;
pub mod init;
pub mod recs;
pub mod sessions;
pub mod wrap;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use flagcaddy_ledger::SqliteStore;
use flagcaddy_types::{ConfigLoader, FlagcaddyConfig, SessionId};

/// Timestamp format for table output.
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn loader(config_path: Option<PathBuf>) -> ConfigLoader {
    match config_path {
        Some(path) => ConfigLoader::new().with_user_path(path),
        None => ConfigLoader::new(),
    }
}

pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Append logs to `path`. Defaults to `info` when `RUST_LOG` is unset.
pub fn init_file_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Load the config and open its record store.
pub fn open_store(loader: &ConfigLoader) -> Result<(FlagcaddyConfig, SqliteStore)> {
    let config = loader.load().context("failed to load configuration")?;
    if !config.db_path.exists() {
        bail!(
            "no database at {}\n  Hint: run 'flagcaddy wrap' to record a session first",
            config.db_path.display()
        );
    }
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("cannot open database {}", config.db_path.display()))?;
    Ok((config, store))
}

/// Resolve a session name to its id, failing with a hint when unknown.
pub fn require_session(store: &SqliteStore, name: &str) -> Result<SessionId> {
    use flagcaddy_ledger::RecordStore;

    store
        .session_id(name)
        .context("failed to look up session")?
        .with_context(|| {
            format!("no session named '{name}'\n  Hint: run 'flagcaddy sessions' to list sessions")
        })
}

/// Shorten `text` to at most `max` characters on one line.
pub fn one_line(text: &str, max: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let flat = flat.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_flattens_and_truncates() {
        assert_eq!(one_line("a\r\n  b\tc", 20), "a b c");
        assert_eq!(one_line("abcdefghij", 6), "abc...");
        assert_eq!(one_line("", 5), "");
    }

    #[test]
    fn explicit_config_path_is_used() {
        let loader = loader(Some(PathBuf::from("/tmp/custom.toml")));
        assert_eq!(loader.user_path(), PathBuf::from("/tmp/custom.toml"));
    }
}
