// ── Core identity type ──
//
// EntityId is the identity of every resource record. The resource backend
// issues integer keys; string keys are accepted so other collections can
// share the same store machinery.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical identifier for a resource record.
///
/// Transparently wraps either an integer key or an opaque string key.
/// Serialized untagged. A string that parses as an integer is read as
/// [`EntityId::Numeric`], whether it arrives as JSON or from the command
/// line, so `42` and `"42"` name the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EntityId {
    Numeric(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Numeric(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Numeric(n) => Self::Numeric(n),
            RawId::Text(s) => Self::from(s),
        })
    }
}

impl EntityId {
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Numeric(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for EntityId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self::Numeric(n)
    }
}

impl From<i32> for EntityId {
    fn from(n: i32) -> Self {
        Self::Numeric(i64::from(n))
    }
}

impl From<u32> for EntityId {
    fn from(n: u32) -> Self {
        Self::Numeric(i64::from(n))
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        match s.parse::<i64>() {
            Ok(n) => Self::Numeric(n),
            Err(_) => Self::Text(s),
        }
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_from_numeric_string() {
        let id = EntityId::from("42");
        assert_eq!(id.as_numeric(), Some(42));
    }

    #[test]
    fn entity_id_from_text_string() {
        let id = EntityId::from("press-7");
        assert_eq!(id.as_text(), Some("press-7"));
    }

    #[test]
    fn entity_id_deserializes_untagged() {
        let ids: Vec<EntityId> = serde_json::from_str(r#"[1, "x"]"#).unwrap();
        assert_eq!(ids, vec![EntityId::Numeric(1), EntityId::Text("x".into())]);
    }

    #[test]
    fn numeric_strings_deserialize_like_numbers() {
        let ids: Vec<EntityId> = serde_json::from_str(r#"["42", 42, "007x"]"#).unwrap();
        assert_eq!(ids[0], EntityId::Numeric(42));
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[0], EntityId::from("42"));
        assert_eq!(ids[2], EntityId::Text("007x".into()));
    }

    #[test]
    fn entity_id_display() {
        assert_eq!(EntityId::from(7).to_string(), "7");
        assert_eq!(EntityId::from("abc").to_string(), "abc");
    }
}
