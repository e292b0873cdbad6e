//! Records persisted by the record store.
//!
//! A [`Session`] owns its [`Event`]s, [`Fact`]s, and [`Recommendation`]s.
//! Records are immutable once written; the `New*` variants are what callers
//! hand to the store before an id has been assigned.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventId, RecommendationId, SessionId};
use crate::FlagcaddyError;

/// One wrapped terminal invocation, identified by an operator-supplied name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An event ready to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub session_id: SessionId,
    pub command: String,
    pub raw_input: String,
    pub output: String,
    pub fingerprint: String,
    pub novelty: f64,
    pub duplicate: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One reconstructed command execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub session_id: SessionId,
    pub command: String,
    pub raw_input: String,
    pub output: String,
    pub fingerprint: String,
    pub novelty: f64,
    pub duplicate: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Category of a [`Fact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Host,
    Network,
    Service,
    Os,
    WebPath,
    Vulnerability,
    Credential,
    Flag,
    Tool,
}

impl FactKind {
    pub const ALL: [FactKind; 9] = [
        FactKind::Host,
        FactKind::Network,
        FactKind::Service,
        FactKind::Os,
        FactKind::WebPath,
        FactKind::Vulnerability,
        FactKind::Credential,
        FactKind::Flag,
        FactKind::Tool,
    ];

    /// Stable name used in the store and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            FactKind::Host => "host",
            FactKind::Network => "network",
            FactKind::Service => "service",
            FactKind::Os => "os",
            FactKind::WebPath => "web_path",
            FactKind::Vulnerability => "vulnerability",
            FactKind::Credential => "credential",
            FactKind::Flag => "flag",
            FactKind::Tool => "tool",
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactKind {
    type Err = FlagcaddyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FlagcaddyError::StoreError(format!("unknown fact type: {s:?}")))
    }
}

/// A typed, deduplicated observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub session_id: SessionId,
    pub kind: FactKind,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// Where a recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    /// A local rule matched.
    Rule,
    /// The advisory tool was called.
    Llm,
}

impl RecommendationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationSource::Rule => "rule",
            RecommendationSource::Llm => "llm",
        }
    }
}

impl fmt::Display for RecommendationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationSource {
    type Err = FlagcaddyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule" => Ok(RecommendationSource::Rule),
            "llm" => Ok(RecommendationSource::Llm),
            other => Err(FlagcaddyError::StoreError(format!(
                "unknown recommendation source: {other:?}"
            ))),
        }
    }
}

/// A recommendation ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecommendation {
    pub session_id: SessionId,
    pub source: RecommendationSource,
    pub title: String,
    pub body: String,
    pub event_ids: Vec<EventId>,
}

/// Advice surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub session_id: SessionId,
    pub source: RecommendationSource,
    pub title: String,
    pub body: String,
    pub event_ids: Vec<EventId>,
    pub created_at: DateTime<Utc>,
}
