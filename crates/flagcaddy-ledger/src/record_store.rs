//! The record store contract consumed by the capture and recommendation path.

use chrono::{DateTime, Utc};

use flagcaddy_types::{
    Event, EventId, Fact, FactKind, FlagcaddyError, NewEvent, NewRecommendation, Recommendation,
    RecommendationId, Session, SessionId,
};

/// Durable keyed storage for sessions, events, facts, and recommendations.
///
/// Writers take `&mut self`: a store is used sequentially from one session's
/// processing path. Implementations shared across concurrent sessions must
/// serialize writes per event themselves.
pub trait RecordStore {
    /// Return the id of the session called `name`, creating it if needed.
    fn ensure_session(&mut self, name: &str) -> Result<SessionId, FlagcaddyError>;

    /// Look up a session id by name without creating it.
    fn session_id(&self, name: &str) -> Result<Option<SessionId>, FlagcaddyError>;

    fn insert_event(&mut self, event: &NewEvent) -> Result<EventId, FlagcaddyError>;

    /// Any earlier event of this session with the same fingerprint.
    fn find_event_by_fingerprint(
        &self,
        session_id: SessionId,
        fingerprint: &str,
    ) -> Result<Option<EventId>, FlagcaddyError>;

    /// Record a fact. Returns `false` when the fact was already known.
    fn add_fact(
        &mut self,
        session_id: SessionId,
        kind: FactKind,
        value: &str,
    ) -> Result<bool, FlagcaddyError>;

    /// Creation time of the session's latest `llm` recommendation.
    fn last_advisory_timestamp(
        &self,
        session_id: SessionId,
    ) -> Result<Option<DateTime<Utc>>, FlagcaddyError>;

    /// Up to `limit` events, most recent first.
    fn recent_events(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<Event>, FlagcaddyError>;

    fn add_recommendation(
        &mut self,
        recommendation: &NewRecommendation,
    ) -> Result<RecommendationId, FlagcaddyError>;

    /// Up to `limit` recommendations, most recent first, optionally for one session.
    fn list_recommendations(
        &self,
        session_id: Option<SessionId>,
        limit: usize,
    ) -> Result<Vec<Recommendation>, FlagcaddyError>;

    /// All sessions, oldest first.
    fn list_sessions(&self) -> Result<Vec<Session>, FlagcaddyError>;

    /// Facts of one session, optionally restricted to one kind.
    fn list_facts(
        &self,
        session_id: SessionId,
        kind: Option<FactKind>,
    ) -> Result<Vec<Fact>, FlagcaddyError>;

    /// The last `limit` events of a session, in chronological order.
    fn list_events(&self, session_id: SessionId, limit: usize)
        -> Result<Vec<Event>, FlagcaddyError>;
}
