//! Attribute model carried by envelopes and items.
//!
//! An attribute value is exactly one of three kinds: a UTC timestamp, a
//! string, or a signed 64-bit integer. Narrower integers widen on
//! conversion. Which keys may hold which kinds is enforced by the codec,
//! not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute map. Ordered so that encoding is deterministic.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Reserved attribute keys.
pub mod keys {
    /// Envelope creation time; must hold a timestamp.
    pub const CREATED_UTC: &str = "CreatedUtc";
    /// Sending service; must hold a string.
    pub const SENDER: &str = "Sender";
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum AttributeValue {
    Timestamp(DateTime<Utc>),
    Text(String),
    Number(i64),
}

impl AttributeValue {
    /// Short name of the value kind, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timestamp(_) => "timestamp",
            Self::Text(_) => "string",
            Self::Number(_) => "number",
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i16> for AttributeValue {
    fn from(value: i16) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}
