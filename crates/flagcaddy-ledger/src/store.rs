//! SqliteStore: SQLite-backed record store.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use flagcaddy_types::{
    Event, EventId, Fact, FactKind, FlagcaddyError, NewEvent, NewRecommendation, Recommendation,
    RecommendationId, Session, SessionId,
};

use crate::record_store::RecordStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id INTEGER NOT NULL REFERENCES sessions(id),
        command TEXT NOT NULL,
        raw_input TEXT NOT NULL,
        output TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        novelty REAL NOT NULL,
        duplicate INTEGER NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id, id);
    CREATE INDEX IF NOT EXISTS idx_events_fingerprint ON events(session_id, fingerprint);

    CREATE TABLE IF NOT EXISTS facts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id INTEGER NOT NULL REFERENCES sessions(id),
        fact_type TEXT NOT NULL,
        value TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(session_id, fact_type, value)
    );

    CREATE TABLE IF NOT EXISTS recommendations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id INTEGER NOT NULL REFERENCES sessions(id),
        source TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        event_ids TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_recs_session ON recommendations(session_id, source, id);
";

/// A record store backed by a single SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Enables WAL mode and creates the tables and indices if they do not
    /// exist. The parent directory must already exist.
    pub fn open(path: &Path) -> Result<Self, FlagcaddyError> {
        let conn = Connection::open(path)
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to open database: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to set WAL mode: {e}")))?;

        let store = Self::with_schema(conn)?;
        info!(path = %path.display(), "record store opened");
        Ok(store)
    }

    /// Open a private in-memory database. Nothing is persisted.
    pub fn open_in_memory() -> Result<Self, FlagcaddyError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            FlagcaddyError::StoreError(format!("failed to open in-memory database: {e}"))
        })?;
        Self::with_schema(conn)
    }

    fn with_schema(conn: Connection) -> Result<Self, FlagcaddyError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to create schema: {e}")))?;
        Ok(Self { conn })
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Convert a caller-supplied limit into an SQLite parameter.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl RecordStore for SqliteStore {
    fn ensure_session(&mut self, name: &str) -> Result<SessionId, FlagcaddyError> {
        SqliteStore::ensure_session(self, name)
    }

    fn session_id(&self, name: &str) -> Result<Option<SessionId>, FlagcaddyError> {
        SqliteStore::session_id(self, name)
    }

    fn insert_event(&mut self, event: &NewEvent) -> Result<EventId, FlagcaddyError> {
        SqliteStore::insert_event(self, event)
    }

    fn find_event_by_fingerprint(
        &self,
        session_id: SessionId,
        fingerprint: &str,
    ) -> Result<Option<EventId>, FlagcaddyError> {
        SqliteStore::find_event_by_fingerprint(self, session_id, fingerprint)
    }

    fn add_fact(
        &mut self,
        session_id: SessionId,
        kind: FactKind,
        value: &str,
    ) -> Result<bool, FlagcaddyError> {
        SqliteStore::add_fact(self, session_id, kind, value)
    }

    fn last_advisory_timestamp(
        &self,
        session_id: SessionId,
    ) -> Result<Option<DateTime<Utc>>, FlagcaddyError> {
        SqliteStore::last_advisory_timestamp(self, session_id)
    }

    fn recent_events(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<Event>, FlagcaddyError> {
        SqliteStore::recent_events(self, session_id, limit)
    }

    fn add_recommendation(
        &mut self,
        recommendation: &NewRecommendation,
    ) -> Result<RecommendationId, FlagcaddyError> {
        SqliteStore::add_recommendation(self, recommendation)
    }

    fn list_recommendations(
        &self,
        session_id: Option<SessionId>,
        limit: usize,
    ) -> Result<Vec<Recommendation>, FlagcaddyError> {
        SqliteStore::list_recommendations(self, session_id, limit)
    }

    fn list_sessions(&self) -> Result<Vec<Session>, FlagcaddyError> {
        SqliteStore::list_sessions(self)
    }

    fn list_facts(
        &self,
        session_id: SessionId,
        kind: Option<FactKind>,
    ) -> Result<Vec<Fact>, FlagcaddyError> {
        SqliteStore::list_facts(self, session_id, kind)
    }

    fn list_events(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<Event>, FlagcaddyError> {
        SqliteStore::list_events(self, session_id, limit)
    }
}
