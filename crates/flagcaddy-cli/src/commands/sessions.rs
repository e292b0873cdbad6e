//! `flagcaddy sessions`: list recorded sessions.

use anyhow::{Context, Result};

use flagcaddy_ledger::RecordStore;
use flagcaddy_types::ConfigLoader;

use crate::commands::{open_store, DATETIME_FMT};

pub fn run(loader: &ConfigLoader) -> Result<()> {
    let (_config, store) = open_store(loader)?;
    let sessions = store.list_sessions().context("failed to list sessions")?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!("{:<6}  {:<20}  {:>6}  {:>6}  NAME", "ID", "CREATED", "FACTS", "RECS");
    println!("{}", "-".repeat(60));
    for session in &sessions {
        let facts = store
            .list_facts(session.id, None)
            .context("failed to count facts")?
            .len();
        let recs = store
            .list_recommendations(Some(session.id), usize::MAX)
            .context("failed to count recommendations")?
            .len();
        println!(
            "{:<6}  {:<20}  {:>6}  {:>6}  {}",
            session.id,
            session.created_at.format(DATETIME_FMT),
            facts,
            recs,
            session.name
        );
    }
    Ok(())
}
