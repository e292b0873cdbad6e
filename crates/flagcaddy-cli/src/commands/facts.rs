//! `flagcaddy facts --session NAME [--type KIND]`

use anyhow::{Context, Result};

use flagcaddy_ledger::RecordStore;
use flagcaddy_types::{ConfigLoader, FactKind};

use crate::commands::{open_store, require_session, DATETIME_FMT};

pub fn run(loader: &ConfigLoader, session: &str, kind: Option<&str>) -> Result<()> {
    let kind = kind
        .map(|name| {
            name.parse::<FactKind>().with_context(|| {
                let known: Vec<&str> = FactKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown fact type '{name}' (expected one of: {})", known.join(", "))
            })
        })
        .transpose()?;

    let (_config, store) = open_store(loader)?;
    let sid = require_session(&store, session)?;
    let facts = store
        .list_facts(sid, kind)
        .context("failed to list facts")?;

    if facts.is_empty() {
        println!("No facts recorded in session '{session}'.");
        return Ok(());
    }

    println!("{:<14}  {:<20}  VALUE", "TYPE", "FIRST SEEN");
    println!("{}", "-".repeat(80));
    for fact in &facts {
        println!(
            "{:<14}  {:<20}  {}",
            fact.kind,
            fact.created_at.format(DATETIME_FMT),
            fact.value
        );
    }
    Ok(())
}
