//! Telemetry event decoding.
//!
//! Parses a raw feed payload into a normalized field map. Location values
//! expand into separate `Latitude`/`Longitude` fields and shift-state values
//! lose their `ShiftState` prefix, so the rest of the pipeline only ever
//! sees flat scalar fields.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::telemetry::{FieldMap, FieldValue, TelemetryEvent};

/// Prefix carried by enumerated shift-state strings on the wire
/// (e.g. "ShiftStateD" for drive).
const SHIFT_STATE_PREFIX: &str = "ShiftState";

/// Errors raised while decoding an inbound telemetry payload.
///
/// A failed decode drops the event: it is logged by the caller and no
/// per-vehicle state is touched.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload was not parseable JSON.
    #[error("unparseable telemetry payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// Payload parsed but the vehicle identifier is absent or empty.
    #[error("telemetry payload missing vin")]
    MissingVin,

    /// Payload parsed but `data` is not a sequence of data points.
    #[error("telemetry payload data is not an array")]
    BadDataShape,
}

/// A parsed payload whose vehicle identifier is known, before any
/// validation of the data sequence.
///
/// Raw-passthrough routing needs the vin without caring whether the
/// payload would survive field extraction, so envelope parsing is a
/// separate step from [`extract_event`].
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Vehicle identifier.
    pub vin: String,

    /// The full parsed payload, kept so raw-passthrough subscribers
    /// receive the event verbatim.
    pub raw: Value,
}

/// A decoded telemetry event, ready for snapshot merging.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    /// Vehicle identifier.
    pub vin: String,

    /// Event creation time as epoch milliseconds.
    pub created_at_ms: i64,

    /// Normalized field delta carried by this event.
    pub fields: FieldMap,

    /// The full parsed payload, kept so raw-passthrough subscribers
    /// receive the event verbatim.
    pub raw: Value,
}

/// Parse one raw payload from the transport far enough to route it.
pub fn decode_envelope(payload: &str) -> Result<Envelope, DecodeError> {
    let raw: Value = serde_json::from_str(payload)?;

    let vin = match raw.get("vin").and_then(Value::as_str) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return Err(DecodeError::MissingVin),
    };

    Ok(Envelope { vin, raw })
}

/// Decode one raw payload from the transport.
pub fn decode_event(payload: &str) -> Result<DecodedEvent, DecodeError> {
    extract_event(decode_envelope(payload)?)
}

/// Extract the normalized field delta from a parsed envelope.
pub fn extract_event(envelope: Envelope) -> Result<DecodedEvent, DecodeError> {
    let Envelope { vin, raw } = envelope;

    // Validate shape before the typed parse so the error names what is
    // actually wrong with the payload.
    if !raw.get("data").map(Value::is_array).unwrap_or(false) {
        return Err(DecodeError::BadDataShape);
    }

    let event: TelemetryEvent = serde_json::from_value(raw.clone())?;

    let mut fields = FieldMap::new();
    for datum in &event.data {
        let value = &datum.value;
        if let Some(loc) = value.location_value {
            fields.insert("Latitude".to_string(), FieldValue::Number(loc.latitude));
            fields.insert("Longitude".to_string(), FieldValue::Number(loc.longitude));
        } else if let Some(shift) = &value.shift_state_value {
            let stripped = shift.strip_prefix(SHIFT_STATE_PREFIX).unwrap_or(shift);
            fields.insert(datum.key.clone(), FieldValue::Text(stripped.to_string()));
        } else if let Some(n) = value.double_value {
            fields.insert(datum.key.clone(), FieldValue::Number(n));
        } else if let Some(s) = &value.string_value {
            // Some feeds carry the enumerated shift state as a plain
            // string; the prefix is stripped wherever it appears.
            let stripped = s.strip_prefix(SHIFT_STATE_PREFIX).unwrap_or(s);
            fields.insert(datum.key.clone(), FieldValue::Text(stripped.to_string()));
        }
        // Data points with no recognized variant are skipped.
    }

    let created_at_ms = event
        .created_at
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.timestamp_millis())
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    Ok(DecodedEvent {
        vin,
        created_at_ms,
        fields,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_expands_location() {
        let payload = r#"{
            "vin": "V1",
            "createdAt": "2024-08-12T10:30:00Z",
            "data": [
                {"key": "Location", "value": {"locationValue": {"latitude": 48.85, "longitude": 2.35}}}
            ]
        }"#;

        let event = decode_event(payload).unwrap();
        assert_eq!(event.vin, "V1");
        assert_eq!(event.fields.get("Latitude"), Some(&FieldValue::Number(48.85)));
        assert_eq!(event.fields.get("Longitude"), Some(&FieldValue::Number(2.35)));
        assert!(!event.fields.contains_key("Location"));
    }

    #[test]
    fn test_decode_strips_shift_state_prefix() {
        let payload = r#"{
            "vin": "V1",
            "data": [{"key": "Gear", "value": {"shiftStateValue": "ShiftStateD"}}]
        }"#;

        let event = decode_event(payload).unwrap();
        assert_eq!(event.fields.get("Gear"), Some(&FieldValue::Text("D".into())));
    }

    #[test]
    fn test_decode_strips_shift_state_prefix_from_strings() {
        let payload = r#"{
            "vin": "V1",
            "data": [{"key": "Gear", "value": {"stringValue": "ShiftStateD"}}]
        }"#;

        let event = decode_event(payload).unwrap();
        assert_eq!(event.fields.get("Gear"), Some(&FieldValue::Text("D".into())));
    }

    #[test]
    fn test_decode_scalar_variants() {
        let payload = r#"{
            "vin": "V1",
            "data": [
                {"key": "Soc", "value": {"doubleValue": 71.5}},
                {"key": "VehicleName", "value": {"stringValue": "Red"}},
                {"key": "Unknown", "value": {}}
            ]
        }"#;

        let event = decode_event(payload).unwrap();
        assert_eq!(event.fields.get("Soc"), Some(&FieldValue::Number(71.5)));
        assert_eq!(event.fields.get("VehicleName"), Some(&FieldValue::Text("Red".into())));
        assert!(!event.fields.contains_key("Unknown"));
    }

    #[test]
    fn test_decode_created_at_millis() {
        let payload = r#"{
            "vin": "V1",
            "createdAt": "2024-08-12T10:30:00Z",
            "data": []
        }"#;

        let event = decode_event(payload).unwrap();
        assert_eq!(event.created_at_ms, 1723458600000);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_event("{ not json"), Err(DecodeError::Parse(_))));
    }

    #[test]
    fn test_decode_rejects_missing_vin() {
        let payload = r#"{"data": []}"#;
        assert!(matches!(decode_event(payload), Err(DecodeError::MissingVin)));

        let payload = r#"{"vin": "", "data": []}"#;
        assert!(matches!(decode_event(payload), Err(DecodeError::MissingVin)));
    }

    #[test]
    fn test_decode_rejects_non_array_data() {
        let payload = r#"{"vin": "V1", "data": {"key": "Soc"}}"#;
        assert!(matches!(decode_event(payload), Err(DecodeError::BadDataShape)));

        let payload = r#"{"vin": "V1"}"#;
        assert!(matches!(decode_event(payload), Err(DecodeError::BadDataShape)));
    }

    #[test]
    fn test_decode_keeps_raw_payload() {
        let payload = r#"{"vin": "V1", "data": [], "extra": {"nested": true}}"#;
        let event = decode_event(payload).unwrap();
        assert_eq!(event.raw["extra"]["nested"], serde_json::json!(true));
    }

    #[test]
    fn test_envelope_does_not_require_data() {
        // The envelope only routes; data-shape validation happens at
        // field extraction.
        let envelope = decode_envelope(r#"{"vin": "V1"}"#).unwrap();
        assert_eq!(envelope.vin, "V1");

        let envelope = decode_envelope(r#"{"vin": "V1", "data": 42}"#).unwrap();
        assert!(matches!(extract_event(envelope), Err(DecodeError::BadDataShape)));
    }

    #[test]
    fn test_envelope_still_requires_vin() {
        assert!(matches!(decode_envelope(r#"{"data": []}"#), Err(DecodeError::MissingVin)));
        assert!(matches!(decode_envelope("{ not json"), Err(DecodeError::Parse(_))));
    }
}
