//! Streaming message composition.
//!
//! Turns a merged field snapshot into the positional value string expected
//! by the downstream streaming consumer. The slot order is a fixed wire
//! contract and must not change:
//!
//! ```text
//! ts, speed, odometer, soc, elevation, est_heading, est_lat, est_lng,
//! power, shift_state, range, est_range, heading
//! ```
//!
//! Emission is gated on a minimum viable field set: position plus a
//! non-empty gear. Incomplete snapshots are absorbed silently (the caller
//! still updates snapshot state).

use crate::telemetry::{FieldMap, FieldValue};

/// Number of positional slots in a composed value string.
pub const VALUE_SLOTS: usize = 13;

/// Compose the positional value string for one vehicle event.
///
/// Returns `None` while `Latitude`, `Longitude` or a non-empty `Gear` is
/// still missing from the merged snapshot.
pub fn compose_value(fields: &FieldMap, created_at_ms: i64) -> Option<String> {
    if !is_complete(fields) {
        return None;
    }

    let slots: [String; VALUE_SLOTS] = [
        created_at_ms.to_string(),
        int_slot(fields, "VehicleSpeed"),
        raw_slot(fields, "Odometer"),
        int_slot(fields, "Soc"),
        String::new(), // elevation, unavailable in this feed
        raw_slot(fields, "GpsHeading"),
        raw_slot(fields, "Latitude"),
        raw_slot(fields, "Longitude"),
        derive_power(fields).to_string(),
        raw_slot(fields, "Gear"),
        raw_slot(fields, "RatedRange"),
        raw_slot(fields, "EstBatteryRange"),
        raw_slot(fields, "GpsHeading"),
    ];

    Some(slots.join(","))
}

/// Completeness gate: position and a non-empty gear must be known.
pub fn is_complete(fields: &FieldMap) -> bool {
    let gear_known = fields
        .get("Gear")
        .map(|g| !g.is_empty_text())
        .unwrap_or(false);
    fields.contains_key("Latitude") && fields.contains_key("Longitude") && gear_known
}

/// Charging power in the composed message.
///
/// DC charging power is checked first and wins when it parses as a positive
/// integer; otherwise AC is tried the same way; otherwise 0. The DC-first
/// preference is a provisional heuristic inherited from an upstream feed
/// limitation, not a verified physical derivation.
fn derive_power(fields: &FieldMap) -> i64 {
    positive_int(fields, "DCChargingPower")
        .or_else(|| positive_int(fields, "ACChargingPower"))
        .unwrap_or(0)
}

fn positive_int(fields: &FieldMap, key: &str) -> Option<i64> {
    fields
        .get(key)
        .and_then(FieldValue::as_int)
        .filter(|p| *p > 0)
}

/// Integer-parsed slot, empty when the key is absent or unparsable.
fn int_slot(fields: &FieldMap, key: &str) -> String {
    fields
        .get(key)
        .and_then(FieldValue::as_int)
        .map(|n| n.to_string())
        .unwrap_or_default()
}

/// Pass-through slot, empty when the key is absent.
fn raw_slot(fields: &FieldMap, key: &str) -> String {
    fields.get(key).map(|v| v.to_string()).unwrap_or_default()
}
