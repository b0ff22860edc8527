//! Query timeframes
//!
//! A timeframe is either a relative token understood by the service
//! (`this_14_days`, `previous_3_hours`, ...) or an absolute `{start, end}`
//! pair of ISO-8601 timestamps. On the wire both live under the `timeframe`
//! key: a plain string for relative, an object for absolute.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire key carrying a timeframe
pub const TIMEFRAME_KEY: &str = "timeframe";

/// A relative or absolute time range for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timeframe {
    /// Relative token, e.g. `this_14_days`
    Relative(String),
    /// Absolute range in ISO-8601
    Absolute { start: String, end: String },
}

impl Timeframe {
    /// Create a relative timeframe
    pub fn relative(token: impl Into<String>) -> Self {
        Self::Relative(token.into())
    }

    /// Create an absolute timeframe from ISO-8601 strings
    pub fn absolute(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self::Absolute {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Create an absolute timeframe from UTC datetimes
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Absolute {
            start: start.to_rfc3339_opts(SecondsFormat::Millis, true),
            end: end.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Absolute range covering the last N days up to now
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self::between(end - chrono::Duration::days(days), end)
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, Self::Relative(_))
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, Self::Absolute { .. })
    }

    /// The value placed under the `timeframe` key
    pub fn to_value(&self) -> Value {
        match self {
            Self::Relative(token) => Value::String(token.clone()),
            Self::Absolute { start, end } => {
                let mut range = Map::new();
                range.insert("start".to_string(), Value::String(start.clone()));
                range.insert("end".to_string(), Value::String(end.clone()));
                Value::Object(range)
            }
        }
    }

    /// Wire arguments contributed by this timeframe
    pub fn to_wire_args(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert(TIMEFRAME_KEY.to_string(), self.to_value());
        args
    }

    /// Decode a timeframe as it appears in interval results.
    ///
    /// A string becomes a relative timeframe; an object becomes an absolute
    /// one, with a missing or non-string bound read as empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(token) => Some(Self::Relative(token.clone())),
            Value::Object(range) => {
                let bound = |key: &str| {
                    range
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                Some(Self::Absolute {
                    start: bound("start"),
                    end: bound("end"),
                })
            }
            _ => None,
        }
    }

    /// Parse the bounds of an absolute timeframe
    ///
    /// Returns `None` for relative timeframes or unparseable bounds.
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            Self::Relative(_) => None,
            Self::Absolute { start, end } => {
                let start = DateTime::parse_from_rfc3339(start).ok()?;
                let end = DateTime::parse_from_rfc3339(end).ok()?;
                Some((start.with_timezone(&Utc), end.with_timezone(&Utc)))
            }
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relative(token) => write!(f, "{}", token),
            Self::Absolute { start, end } => write!(f, "{}..{}", start, end),
        }
    }
}
