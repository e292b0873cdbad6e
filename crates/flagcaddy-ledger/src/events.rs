//! Event records and fingerprint lookup.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use flagcaddy_types::{Event, EventId, FlagcaddyError, NewEvent, SessionId};

use crate::parse_helpers::parse_datetime;
use crate::store::{sql_limit, SqliteStore};

/// Column list for event queries (must match `row_to_event` field order).
const EVENT_COLUMNS: &str = "id, session_id, command, raw_input, output, fingerprint, novelty, duplicate, started_at, finished_at, created_at";

impl SqliteStore {
    /// Insert an event and return its id.
    pub fn insert_event(&mut self, event: &NewEvent) -> Result<EventId, FlagcaddyError> {
        self.connection()
            .execute(
                "INSERT INTO events (session_id, command, raw_input, output, fingerprint, novelty, duplicate, started_at, finished_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    event.session_id,
                    event.command,
                    event.raw_input,
                    event.output,
                    event.fingerprint,
                    event.novelty,
                    event.duplicate,
                    event.started_at.to_rfc3339(),
                    event.finished_at.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to insert event: {e}")))?;

        let id = self.connection().last_insert_rowid();
        debug!(session_id = event.session_id, event_id = id, "event stored");
        Ok(id)
    }

    /// The earliest event of the session carrying `fingerprint`, if any.
    pub fn find_event_by_fingerprint(
        &self,
        session_id: SessionId,
        fingerprint: &str,
    ) -> Result<Option<EventId>, FlagcaddyError> {
        self.connection()
            .query_row(
                "SELECT id FROM events WHERE session_id = ?1 AND fingerprint = ?2
                 ORDER BY id ASC LIMIT 1",
                params![session_id, fingerprint],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| {
                FlagcaddyError::StoreError(format!("failed to look up fingerprint: {e}"))
            })
    }

    /// Up to `limit` events, most recent first.
    pub fn recent_events(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<Event>, FlagcaddyError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2"
        );
        let mut stmt = self
            .connection()
            .prepare(&sql)
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map(params![session_id, sql_limit(limit)], row_to_event)
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to query events: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to read event row: {e}")))
    }

    /// The last `limit` events of a session, oldest first.
    pub fn list_events(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<Event>, FlagcaddyError> {
        let mut events = self.recent_events(session_id, limit)?;
        events.reverse();
        Ok(events)
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        session_id: row.get(1)?,
        command: row.get(2)?,
        raw_input: row.get(3)?,
        output: row.get(4)?,
        fingerprint: row.get(5)?,
        novelty: row.get(6)?,
        duplicate: row.get(7)?,
        started_at: parse_datetime(&row.get::<_, String>(8)?, 8)?,
        finished_at: parse_datetime(&row.get::<_, String>(9)?, 9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::store::SqliteStore;
    use crate::test_helpers::new_event;

    #[test]
    fn fingerprint_lookup_scoped_to_session() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let a = store.ensure_session("a").unwrap();
        let b = store.ensure_session("b").unwrap();

        let id = store.insert_event(&new_event(a, "id", "fp-1")).unwrap();

        assert_eq!(store.find_event_by_fingerprint(a, "fp-1").unwrap(), Some(id));
        assert_eq!(store.find_event_by_fingerprint(b, "fp-1").unwrap(), None);
        assert_eq!(store.find_event_by_fingerprint(a, "fp-2").unwrap(), None);
    }

    #[test]
    fn duplicate_fingerprints_are_accepted() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let s = store.ensure_session("a").unwrap();
        let first = store.insert_event(&new_event(s, "id", "same")).unwrap();
        let second = store.insert_event(&new_event(s, "id", "same")).unwrap();

        assert_ne!(first, second);
        assert_eq!(store.find_event_by_fingerprint(s, "same").unwrap(), Some(first));
    }

    #[test]
    fn recent_events_most_recent_first_and_limited() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let s = store.ensure_session("a").unwrap();
        for cmd in ["one", "two", "three"] {
            store.insert_event(&new_event(s, cmd, cmd)).unwrap();
        }

        let recent: Vec<String> = store
            .recent_events(s, 2)
            .unwrap()
            .into_iter()
            .map(|e| e.command)
            .collect();
        assert_eq!(recent, vec!["three", "two"]);

        let listed: Vec<String> = store
            .list_events(s, 10)
            .unwrap()
            .into_iter()
            .map(|e| e.command)
            .collect();
        assert_eq!(listed, vec!["one", "two", "three"]);
    }

    #[test]
    fn event_fields_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let s = store.ensure_session("a").unwrap();
        let mut event = new_event(s, "nmap -sV 10.0.0.1", "fp");
        event.novelty = 0.95;
        event.duplicate = true;
        store.insert_event(&event).unwrap();

        let stored = store.recent_events(s, 1).unwrap().remove(0);
        assert_eq!(stored.command, "nmap -sV 10.0.0.1");
        assert_eq!(stored.novelty, 0.95);
        assert!(stored.duplicate);
        assert_eq!(stored.started_at, event.started_at);
    }
}
