//! `flagcaddy recs [--session NAME] [--last N]`

use anyhow::{Context, Result};

use flagcaddy_ledger::RecordStore;
use flagcaddy_types::ConfigLoader;

use crate::commands::{open_store, require_session, DATETIME_FMT};

pub fn run(loader: &ConfigLoader, session: Option<&str>, last: usize) -> Result<()> {
    let (_config, store) = open_store(loader)?;
    let sid = session
        .map(|name| require_session(&store, name))
        .transpose()?;
    let recs = store
        .list_recommendations(sid, last)
        .context("failed to list recommendations")?;

    if recs.is_empty() {
        println!("No recommendations yet.");
        return Ok(());
    }

    for rec in &recs {
        let events = rec
            .event_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "[{}] #{} {} ({}) events: {}",
            rec.created_at.format(DATETIME_FMT),
            rec.id,
            rec.title,
            rec.source,
            events
        );
        for line in rec.body.lines() {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}
