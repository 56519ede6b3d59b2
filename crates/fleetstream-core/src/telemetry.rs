//! Vehicle telemetry model types.
//!
//! These types mirror the fleet telemetry feed's JSON payload:
//! one event per publish, identified by VIN, carrying an ordered list
//! of key/value data points. The feed only sends fields that changed,
//! so a single event is almost never a complete picture of the vehicle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Last-known field values for one vehicle.
pub type FieldMap = HashMap<String, FieldValue>;

/// A single scalar telemetry value.
///
/// The feed mixes numeric and string data; downstream serialization
/// joins values into a positional string, so `Display` matters: whole
/// numbers render without a fractional part (`12`, not `12.0`).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Integer interpretation with parseInt-like semantics: numbers
    /// truncate toward zero, strings parse an optional-sign digit prefix.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n as i64),
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => parse_int_prefix(s),
        }
    }

    /// True for empty-string values (the feed uses "" for unknown gear).
    pub fn is_empty_text(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

fn parse_int_prefix(s: &str) -> Option<i64> {
    let t = s.trim_start();
    let mut end = 0;
    for (i, c) in t.char_indices() {
        if i == 0 && (c == '-' || c == '+') {
            end = 1;
            continue;
        }
        if c.is_ascii_digit() {
            end = i + 1;
        } else {
            break;
        }
    }
    if end == 0 || (end == 1 && !t.as_bytes()[0].is_ascii_digit()) {
        return None;
    }
    t[..end].parse().ok()
}

/// Raw inbound telemetry event as published on the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Vehicle identifier, the routing key for all per-vehicle state.
    pub vin: String,

    /// ISO 8601 event creation time, set by the feed.
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Changed fields since the previous event for this vehicle.
    pub data: Vec<TelemetryDatum>,
}

/// One key/value data point within an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryDatum {
    pub key: String,
    pub value: DatumValue,
}

/// Value envelope used by the feed; exactly one variant field is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatumValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_value: Option<LocationValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_state_value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
}

/// Latitude/longitude pair carried by location data points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationValue {
    pub latitude: f64,
    pub longitude: f64,
}
