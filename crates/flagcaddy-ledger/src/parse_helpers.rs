//! Helpers for parsing stored values out of SQLite rows.
//!
//! Parse failures become `rusqlite::Error` instead of panics, since rows may
//! have been written by an older build or edited by hand.

use std::str::FromStr;

use chrono::{DateTime, Utc};

/// Parse an RFC 3339 datetime string from a SQLite column.
pub(crate) fn parse_datetime(s: &str, col: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse a `FromStr` enum (fact kind, recommendation source) from a column.
pub(crate) fn parse_enum<T>(s: &str, col: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse a JSON array of ids from a column.
pub(crate) fn parse_id_list(s: &str, col: usize) -> rusqlite::Result<Vec<i64>> {
    serde_json::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}
