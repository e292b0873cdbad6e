//! Fact records.
//!
//! `(session_id, fact_type, value)` is unique. Re-adding a known fact is a
//! no-op and reports `false`, which is what the novelty score counts on.

use chrono::Utc;
use rusqlite::params;

use flagcaddy_types::{Fact, FactKind, FlagcaddyError, SessionId};

use crate::parse_helpers::{parse_datetime, parse_enum};
use crate::store::SqliteStore;

impl SqliteStore {
    /// Record a fact. Returns `true` only when it was not already known.
    pub fn add_fact(
        &mut self,
        session_id: SessionId,
        kind: FactKind,
        value: &str,
    ) -> Result<bool, FlagcaddyError> {
        let changed = self
            .connection()
            .execute(
                "INSERT OR IGNORE INTO facts (session_id, fact_type, value, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, kind.as_str(), value, Utc::now().to_rfc3339()],
            )
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to add fact: {e}")))?;
        Ok(changed == 1)
    }

    /// Facts of one session, grouped by kind then value.
    pub fn list_facts(
        &self,
        session_id: SessionId,
        kind: Option<FactKind>,
    ) -> Result<Vec<Fact>, FlagcaddyError> {
        let mut stmt = self
            .connection()
            .prepare(
                "SELECT session_id, fact_type, value, created_at FROM facts
                 WHERE session_id = ?1 AND (?2 IS NULL OR fact_type = ?2)
                 ORDER BY fact_type ASC, value ASC",
            )
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map(params![session_id, kind.map(FactKind::as_str)], |row| {
                Ok(Fact {
                    session_id: row.get(0)?,
                    kind: parse_enum(&row.get::<_, String>(1)?, 1)?,
                    value: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?, 3)?,
                })
            })
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to query facts: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to read fact row: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use flagcaddy_types::FactKind;

    use crate::store::SqliteStore;

    #[test]
    fn fact_insert_is_unique_per_session() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let a = store.ensure_session("a").unwrap();
        let b = store.ensure_session("b").unwrap();

        assert!(store.add_fact(a, FactKind::Service, "22/tcp/ssh").unwrap());
        assert!(!store.add_fact(a, FactKind::Service, "22/tcp/ssh").unwrap());
        // same value under a different kind or session is a distinct fact
        assert!(store.add_fact(a, FactKind::Tool, "22/tcp/ssh").unwrap());
        assert!(store.add_fact(b, FactKind::Service, "22/tcp/ssh").unwrap());

        assert_eq!(store.list_facts(a, None).unwrap().len(), 2);
    }

    #[test]
    fn list_facts_filters_by_kind() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let s = store.ensure_session("a").unwrap();
        store.add_fact(s, FactKind::Host, "10.10.10.5").unwrap();
        store.add_fact(s, FactKind::Service, "80/tcp/http").unwrap();
        store.add_fact(s, FactKind::Service, "22/tcp/ssh").unwrap();

        let services = store.list_facts(s, Some(FactKind::Service)).unwrap();
        let values: Vec<&str> = services.iter().map(|f| f.value.as_str()).collect();
        assert_eq!(values, vec!["22/tcp/ssh", "80/tcp/http"]);
        assert!(services.iter().all(|f| f.kind == FactKind::Service));
    }
}
