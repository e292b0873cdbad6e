//! Session records.
//!
//! A session is one wrapped terminal invocation. Sessions are keyed by name,
//! so wrapping again with the same name attaches to the existing session.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::info;

use flagcaddy_types::{FlagcaddyError, Session, SessionId};

use crate::parse_helpers::parse_datetime;
use crate::store::SqliteStore;

/// Column list for session queries (must match `row_to_session` field order).
const SESSION_COLUMNS: &str = "id, name, created_at";

impl SqliteStore {
    /// Return the id of the session called `name`, creating it if needed.
    pub fn ensure_session(&mut self, name: &str) -> Result<SessionId, FlagcaddyError> {
        if let Some(id) = self.session_id(name)? {
            return Ok(id);
        }

        self.connection()
            .execute(
                "INSERT INTO sessions (name, created_at) VALUES (?1, ?2)
                 ON CONFLICT(name) DO NOTHING",
                params![name, Utc::now().to_rfc3339()],
            )
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to create session: {e}")))?;

        let id = self.session_id(name)?.ok_or_else(|| {
            FlagcaddyError::StoreError(format!("session {name:?} missing after insert"))
        })?;
        info!(session_id = id, name, "session created");
        Ok(id)
    }

    /// Look up a session id by name.
    pub fn session_id(&self, name: &str) -> Result<Option<SessionId>, FlagcaddyError> {
        self.connection()
            .query_row(
                "SELECT id FROM sessions WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to look up session: {e}")))
    }

    /// All sessions, oldest first.
    pub fn list_sessions(&self) -> Result<Vec<Session>, FlagcaddyError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY id ASC");
        let mut stmt = self
            .connection()
            .prepare(&sql)
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map([], row_to_session)
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to list sessions: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to read session row: {e}")))
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::store::SqliteStore;

    #[test]
    fn ensure_session_is_idempotent_by_name() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = store.ensure_session("htb-lame").unwrap();
        let again = store.ensure_session("htb-lame").unwrap();
        let other = store.ensure_session("htb-blue").unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(store.list_sessions().unwrap().len(), 2);
    }

    #[test]
    fn session_id_absent_for_unknown_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.session_id("nope").unwrap(), None);
    }

    #[test]
    fn list_sessions_in_creation_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.ensure_session("a").unwrap();
        store.ensure_session("b").unwrap();
        let names: Vec<String> = store
            .list_sessions()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
