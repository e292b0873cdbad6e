//! Recommendation records.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use flagcaddy_types::{
    FlagcaddyError, NewRecommendation, Recommendation, RecommendationId, RecommendationSource,
    SessionId,
};

use crate::parse_helpers::{parse_datetime, parse_enum, parse_id_list};
use crate::store::{sql_limit, SqliteStore};

/// Column list for recommendation queries (must match `row_to_recommendation`).
const RECOMMENDATION_COLUMNS: &str = "id, session_id, source, title, body, event_ids, created_at";

impl SqliteStore {
    /// Insert a recommendation and return its id.
    pub fn add_recommendation(
        &mut self,
        rec: &NewRecommendation,
    ) -> Result<RecommendationId, FlagcaddyError> {
        let event_ids = serde_json::to_string(&rec.event_ids).map_err(|e| {
            FlagcaddyError::StoreError(format!("failed to serialize event ids: {e}"))
        })?;
        self.connection()
            .execute(
                "INSERT INTO recommendations (session_id, source, title, body, event_ids, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rec.session_id,
                    rec.source.as_str(),
                    rec.title,
                    rec.body,
                    event_ids,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| {
                FlagcaddyError::StoreError(format!("failed to insert recommendation: {e}"))
            })?;

        let id = self.connection().last_insert_rowid();
        debug!(
            session_id = rec.session_id,
            recommendation_id = id,
            source = %rec.source,
            title = %rec.title,
            "recommendation stored"
        );
        Ok(id)
    }

    /// Creation time of the session's latest advisory (`llm`) recommendation.
    pub fn last_advisory_timestamp(
        &self,
        session_id: SessionId,
    ) -> Result<Option<DateTime<Utc>>, FlagcaddyError> {
        let raw: Option<String> = self
            .connection()
            .query_row(
                "SELECT created_at FROM recommendations
                 WHERE session_id = ?1 AND source = ?2
                 ORDER BY id DESC LIMIT 1",
                params![session_id, RecommendationSource::Llm.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| {
                FlagcaddyError::StoreError(format!("failed to query last advisory: {e}"))
            })?;
        raw.map(|s| parse_datetime(&s, 0))
            .transpose()
            .map_err(|e| FlagcaddyError::StoreError(format!("corrupt advisory timestamp: {e}")))
    }

    /// Up to `limit` recommendations, most recent first.
    pub fn list_recommendations(
        &self,
        session_id: Option<SessionId>,
        limit: usize,
    ) -> Result<Vec<Recommendation>, FlagcaddyError> {
        let sql = format!(
            "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations
             WHERE (?1 IS NULL OR session_id = ?1)
             ORDER BY id DESC LIMIT ?2"
        );
        let mut stmt = self
            .connection()
            .prepare(&sql)
            .map_err(|e| FlagcaddyError::StoreError(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map(params![session_id, sql_limit(limit)], row_to_recommendation)
            .map_err(|e| {
                FlagcaddyError::StoreError(format!("failed to query recommendations: {e}"))
            })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| {
            FlagcaddyError::StoreError(format!("failed to read recommendation row: {e}"))
        })
    }
}

fn row_to_recommendation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recommendation> {
    Ok(Recommendation {
        id: row.get(0)?,
        session_id: row.get(1)?,
        source: parse_enum(&row.get::<_, String>(2)?, 2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        event_ids: parse_id_list(&row.get::<_, String>(5)?, 5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use flagcaddy_types::{NewRecommendation, RecommendationSource};

    use crate::store::SqliteStore;

    fn rec(session_id: i64, source: RecommendationSource, title: &str) -> NewRecommendation {
        NewRecommendation {
            session_id,
            source,
            title: title.into(),
            body: "body".into(),
            event_ids: vec![1, 2],
        }
    }

    #[test]
    fn last_advisory_timestamp_ignores_rule_recommendations() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let s = store.ensure_session("a").unwrap();
        assert!(store.last_advisory_timestamp(s).unwrap().is_none());

        store
            .add_recommendation(&rec(s, RecommendationSource::Rule, "rule"))
            .unwrap();
        assert!(store.last_advisory_timestamp(s).unwrap().is_none());

        store
            .add_recommendation(&rec(s, RecommendationSource::Llm, "advice"))
            .unwrap();
        assert!(store.last_advisory_timestamp(s).unwrap().is_some());
    }

    #[test]
    fn list_recommendations_filters_and_orders() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let a = store.ensure_session("a").unwrap();
        let b = store.ensure_session("b").unwrap();
        store
            .add_recommendation(&rec(a, RecommendationSource::Rule, "first"))
            .unwrap();
        store
            .add_recommendation(&rec(b, RecommendationSource::Rule, "other"))
            .unwrap();
        store
            .add_recommendation(&rec(a, RecommendationSource::Llm, "second"))
            .unwrap();

        let for_a = store.list_recommendations(Some(a), 10).unwrap();
        let titles: Vec<&str> = for_a.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert_eq!(for_a[0].event_ids, vec![1, 2]);
        assert_eq!(for_a[0].source, RecommendationSource::Llm);

        assert_eq!(store.list_recommendations(None, 10).unwrap().len(), 3);
        assert_eq!(store.list_recommendations(None, 1).unwrap().len(), 1);
    }
}
