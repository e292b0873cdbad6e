//! `flagcaddy wrap [--session NAME] [-- command args...]`
//!
//! Runs the operator's shell (or the given command) in a pseudo-terminal,
//! records every command/output pair, and feeds it to the recommendation
//! engine. The session ends when the wrapped program exits.

use std::fs;

use anyhow::{Context, Result};
use tracing::info;

use flagcaddy_engine::{
    AdvisoryClient, CodexAdvisor, DisabledAdvisor, RecommendationEngine, RegexFactExtractor,
};
use flagcaddy_ledger::SqliteStore;
use flagcaddy_types::{ConfigLoader, FlagcaddyConfig, SessionName};

use crate::commands::init_file_logging;

/// Session name used when `--session` is not given.
pub const DEFAULT_SESSION: &str = "default";

/// Program used when neither the config nor `$SHELL` names one.
const FALLBACK_SHELL: &str = "/bin/sh";

/// Run the `flagcaddy wrap` command and return the child's exit code.
pub fn run(loader: &ConfigLoader, session: Option<&str>, command: &[String]) -> Result<i32> {
    let config = loader.load().context("failed to load configuration")?;
    ensure_dirs(&config)?;
    init_file_logging(&config.log_path())?;

    let session = SessionName::parse(session.unwrap_or(DEFAULT_SESSION))
        .context("invalid session name")?;
    let argv = resolve_argv(
        command,
        config.capture.shell.as_deref(),
        std::env::var("SHELL").ok().as_deref(),
    );

    let mut engine = build_engine(&config, &session)?;
    info!(session = %session, argv = ?argv, db = %config.db_path.display(), "wrap starting");
    eprintln!(
        "flagcaddy: recording session '{session}' ({}). Exit the shell to stop.",
        argv.join(" ")
    );

    let code = flagcaddy_pilot::start(&config.capture, &session, &argv, &mut engine)
        .context("terminal capture failed")?;

    info!(session = %session, code, "wrap finished");
    eprintln!("flagcaddy: session '{session}' ended (exit {code})");
    Ok(code)
}

fn ensure_dirs(config: &FlagcaddyConfig) -> Result<()> {
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("cannot create {}", config.data_dir.display()))?;
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    Ok(())
}

fn build_engine(config: &FlagcaddyConfig, session: &SessionName) -> Result<RecommendationEngine> {
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("cannot open database {}", config.db_path.display()))?;
    let advisor: Box<dyn AdvisoryClient> = if config.advisory.enabled {
        Box::new(CodexAdvisor::new(&config.advisory))
    } else {
        Box::new(DisabledAdvisor)
    };
    let extractor = RegexFactExtractor::new().context("failed to build fact extractor")?;
    RecommendationEngine::new(
        Box::new(store),
        Box::new(extractor),
        advisor,
        config.engine_settings(),
        session,
    )
    .context("failed to start recommendation engine")
}

/// The program to wrap: explicit command, then configured shell, then
/// `$SHELL`, then `/bin/sh`.
pub fn resolve_argv(command: &[String], configured: Option<&str>, env_shell: Option<&str>) -> Vec<String> {
    if !command.is_empty() {
        return command.to_vec();
    }
    let shell = configured
        .into_iter()
        .chain(env_shell)
        .find(|s| !s.trim().is_empty())
        .unwrap_or(FALLBACK_SHELL);
    vec![shell.to_string()]
}
