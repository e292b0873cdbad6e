//! `flagcaddy events --session NAME [--last N]`

use anyhow::{Context, Result};

use flagcaddy_ledger::RecordStore;
use flagcaddy_types::ConfigLoader;

use crate::commands::{one_line, open_store, require_session, DATETIME_FMT};

/// Width of the output preview column.
const OUTPUT_PREVIEW_CHARS: usize = 60;

pub fn run(loader: &ConfigLoader, session: &str, last: usize) -> Result<()> {
    let (_config, store) = open_store(loader)?;
    let sid = require_session(&store, session)?;
    let events = store
        .list_events(sid, last)
        .context("failed to list events")?;

    if events.is_empty() {
        println!("No events recorded in session '{session}'.");
        return Ok(());
    }

    println!(
        "{:<6}  {:<20}  {:>7}  {:<3}  {:<40}  OUTPUT",
        "ID", "FINISHED", "NOVELTY", "DUP", "COMMAND"
    );
    println!("{}", "-".repeat(140));
    for event in &events {
        let output = flagcaddy_pilot::strip_ansi(&event.output);
        println!(
            "{:<6}  {:<20}  {:>7.2}  {:<3}  {:<40}  {}",
            event.id,
            event.finished_at.format(DATETIME_FMT),
            event.novelty,
            if event.duplicate { "Y" } else { "" },
            one_line(&event.command, 40),
            one_line(&output, OUTPUT_PREVIEW_CHARS)
        );
    }
    Ok(())
}
