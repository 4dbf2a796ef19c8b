//! Raw message to [`EventRecord`] normalization.
//!
//! Producers are untrusted browsers and apps, so normalization repairs rather
//! than rejects wherever it can. Only payloads that are not a JSON object are
//! rejected. Each repair step is idempotent, so feeding a serialized
//! `EventRecord` back through [`normalize`] yields the same record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use snafu::{ResultExt, ensure};

use crate::error::{EmptyPayloadSnafu, InvalidJsonSnafu, NotAnObjectSnafu, Result};
use crate::record::{EMPTY_METADATA, EventRecord, STRING_FIELDS, UNKNOWN, default_for};

/// Timestamp formats with an explicit offset tried after RFC 3339.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Offset-less formats, interpreted as UTC.
const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Normalizes a raw message, using the current time for missing timestamps.
pub fn normalize(raw: &[u8]) -> Result<EventRecord> {
    normalize_at(raw, Utc::now())
}

/// Normalizes a raw message, using `now` for missing or unparseable timestamps.
pub fn normalize_at(raw: &[u8], now: DateTime<Utc>) -> Result<EventRecord> {
    ensure!(!raw.is_empty(), EmptyPayloadSnafu {});

    match serde_json::from_slice::<Value>(raw).context(InvalidJsonSnafu {})? {
        Value::Object(object) => Ok(normalize_object(&object, now)),
        other => NotAnObjectSnafu {
            found: json_type_name(&other),
        }
        .fail(),
    }
}

fn normalize_object(object: &Map<String, Value>, now: DateTime<Utc>) -> EventRecord {
    let timestamp = object
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or(now);

    let mut record = EventRecord::empty_at(truncate_to_micros(timestamp));

    for field in STRING_FIELDS {
        let value = match object.get(field).and_then(string_value) {
            Some(value) if default_for(field) == UNKNOWN && value.trim().is_empty() => {
                UNKNOWN.to_string()
            }
            Some(value) => value,
            None => default_for(field).to_string(),
        };

        if let Some(slot) = record.string_field_mut(field) {
            *slot = value;
        }
    }

    record.interaction_value = object.get("interaction_value").and_then(numeric_value);
    record.metadata = metadata_text(object.get("metadata"));

    record
}

/// Parses an ISO-8601 instant. A trailing `Z` means UTC, and values without an
/// offset are taken as UTC.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(input, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(input, format) {
            return Some(ts.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

/// The table stores microseconds; anything finer would not survive a round trip.
fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts)
}

/// String columns must hold strings, so scalars are stringified and nested
/// values serialized. `null` counts as missing.
fn string_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Some(value.to_string())
        }
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    number.filter(|n| n.is_finite())
}

/// Compact JSON for structured metadata, `{}` for anything else.
///
/// A string holding a JSON object or array is accepted as already serialized.
fn metadata_text(value: Option<&Value>) -> String {
    match value {
        Some(value @ (Value::Object(_) | Value::Array(_))) => value.to_string(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(inner @ (Value::Object(_) | Value::Array(_))) => inner.to_string(),
            _ => EMPTY_METADATA.to_string(),
        },
        _ => EMPTY_METADATA.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
