//! Strongly-typed identifiers to prevent mixing up record ids and names.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::FlagcaddyError;

/// Numeric identifier assigned to a session by the record store.
pub type SessionId = i64;

/// Numeric identifier assigned to an event by the record store.
pub type EventId = i64;

/// Numeric identifier assigned to a recommendation by the record store.
pub type RecommendationId = i64;

/// Maximum length of an operator-supplied session name.
const MAX_SESSION_NAME_LEN: usize = 64;

/// Operator-supplied session name. Uses `Arc<str>` internally so cloning is
/// an atomic increment instead of a heap allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionName(Arc<str>);

impl SessionName {
    /// Validate and wrap a session name.
    ///
    /// Names must be 1..=64 characters of ASCII alphanumerics, `-`, `_`, or `.`
    /// and must not start with `.`.
    pub fn parse(name: &str) -> Result<Self, FlagcaddyError> {
        if name.is_empty() || name.len() > MAX_SESSION_NAME_LEN {
            return Err(FlagcaddyError::ConfigError(format!(
                "session name must be 1-{MAX_SESSION_NAME_LEN} characters, got {}",
                name.len()
            )));
        }
        if name.starts_with('.') {
            return Err(FlagcaddyError::ConfigError(format!(
                "session name may not start with '.': {name:?}"
            )));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(FlagcaddyError::ConfigError(format!(
                "session name {name:?} contains invalid character {bad:?}"
            )));
        }
        Ok(Self(name.into()))
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for SessionName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for SessionName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for SessionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SessionName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SessionName::parse(&s).map_err(serde::de::Error::custom)
    }
}
