//! JSON decoding with a configurable date strategy.
//!
//! serde has no decoder-level date setting, so `JsonDecoder` installs its
//! `DateStrategy` in a thread-local for the duration of one synchronous decode
//! and the `Date` type reads it back from its `Deserialize` impl. Fields that
//! hold plain `chrono` types are unaffected.

use std::cell::Cell;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Decodes response bodies into typed values.
pub trait Decoder: Send + Sync {
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DecodeError>;
}

/// How `Date` fields are read from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStrategy {
    /// RFC 3339 / ISO-8601 strings such as `2024-04-15T10:00:00Z`.
    #[default]
    Iso8601,
    SecondsSince1970,
    MillisecondsSince1970,
}

thread_local! {
    static DATE_STRATEGY: Cell<DateStrategy> = const { Cell::new(DateStrategy::Iso8601) };
}

/// Restores the previous strategy when dropped, so nested decodes compose.
struct StrategyScope(DateStrategy);

impl StrategyScope {
    fn enter(strategy: DateStrategy) -> Self {
        Self(DATE_STRATEGY.with(|cell| cell.replace(strategy)))
    }
}

impl Drop for StrategyScope {
    fn drop(&mut self) {
        DATE_STRATEGY.with(|cell| cell.set(self.0));
    }
}

/// `serde_json` backed decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder {
    date_strategy: DateStrategy,
}

impl JsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_strategy(date_strategy: DateStrategy) -> Self {
        Self { date_strategy }
    }

    pub fn date_strategy(&self) -> DateStrategy {
        self.date_strategy
    }
}

impl Decoder for JsonDecoder {
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DecodeError> {
        let _scope = StrategyScope::enter(self.date_strategy);
        serde_json::from_slice(bytes).map_err(DecodeError::from)
    }
}

/// Structural cause of a decode failure. Kept for diagnostics only; callers of
/// the pipeline see a single flattened `NetworkError::Decode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeCategory {
    /// Malformed JSON.
    Syntax,
    /// Well-formed JSON with a missing key, missing value, or type mismatch.
    Data,
    /// Input ended early.
    Eof,
    Io,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{category:?} error: {message}")]
pub struct DecodeError {
    pub category: DecodeCategory,
    pub message: String,
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        let category = match e.classify() {
            serde_json::error::Category::Syntax => DecodeCategory::Syntax,
            serde_json::error::Category::Data => DecodeCategory::Data,
            serde_json::error::Category::Eof => DecodeCategory::Eof,
            serde_json::error::Category::Io => DecodeCategory::Io,
        };
        Self {
            category,
            message: e.to_string(),
        }
    }
}

/// A UTC timestamp decoded according to the active `DateStrategy`.
///
/// Always serializes as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(pub DateTime<Utc>);

impl From<DateTime<Utc>> for Date {
    fn from(value: DateTime<Utc>) -> Self {
        Date(value)
    }
}

impl Serialize for Date {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl<'de> Deserialize<'de> for Date {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let strategy = DATE_STRATEGY.with(Cell::get);
        deserializer.deserialize_any(DateVisitor(strategy))
    }
}

struct DateVisitor(DateStrategy);

impl DateVisitor {
    fn from_number<E: de::Error>(&self, value: f64) -> Result<Date, E> {
        let millis = match self.0 {
            DateStrategy::SecondsSince1970 => value * 1000.0,
            DateStrategy::MillisecondsSince1970 => value,
            DateStrategy::Iso8601 => {
                return Err(E::invalid_type(de::Unexpected::Float(value), self));
            }
        };
        DateTime::from_timestamp_millis(millis.round() as i64)
            .map(Date)
            .ok_or_else(|| E::custom(format!("timestamp out of range: {value}")))
    }
}

impl<'de> Visitor<'de> for DateVisitor {
    type Value = Date;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            DateStrategy::Iso8601 => f.write_str("an ISO-8601 date string"),
            DateStrategy::SecondsSince1970 => f.write_str("seconds since 1970"),
            DateStrategy::MillisecondsSince1970 => f.write_str("milliseconds since 1970"),
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Date, E> {
        if self.0 != DateStrategy::Iso8601 {
            return Err(E::invalid_type(de::Unexpected::Str(value), &self));
        }
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Date(dt.with_timezone(&Utc)))
            .map_err(|e| E::custom(format!("invalid ISO-8601 date {value:?}: {e}")))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Date, E> {
        self.from_number(value as f64)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Date, E> {
        self.from_number(value as f64)
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Date, E> {
        self.from_number(value)
    }
}
