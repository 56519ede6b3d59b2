//! Per-vehicle snapshot accumulation.
//!
//! The feed only publishes fields that changed, so the store keeps the
//! last known value of every field ever observed per vehicle and overlays
//! each new delta on top. State never shrinks except on process restart;
//! cardinality is bounded by fleet size.

use std::collections::HashMap;

use crate::telemetry::FieldMap;

#[derive(Debug, Default)]
struct VehicleState {
    fields: FieldMap,
    last_seen_ms: Option<i64>,
}

/// Accumulator of last-known field values per vehicle.
///
/// Owns its maps exclusively; callers interact only through the merge and
/// activity operations so the locking discipline stays in one place.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    vehicles: HashMap<String, VehicleState>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay `delta` onto the vehicle's stored fields, delta winning on
    /// key collision, and return the merged map.
    pub fn merge(&mut self, vin: &str, delta: FieldMap) -> &FieldMap {
        let state = self.vehicles.entry(vin.to_string()).or_default();
        state.fields.extend(delta);
        &state.fields
    }

    /// Record telemetry activity for a vehicle, whether or not a message
    /// was emitted for the event.
    pub fn mark_seen(&mut self, vin: &str, at_ms: i64) {
        self.vehicles.entry(vin.to_string()).or_default().last_seen_ms = Some(at_ms);
    }

    /// Last recorded telemetry activity, if any.
    pub fn last_seen(&self, vin: &str) -> Option<i64> {
        self.vehicles.get(vin).and_then(|s| s.last_seen_ms)
    }

    /// Current merged fields for a vehicle.
    pub fn fields(&self, vin: &str) -> Option<&FieldMap> {
        self.vehicles.get(vin).map(|s| &s.fields)
    }

    /// Number of vehicles observed so far.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::FieldValue;
    use pretty_assertions::assert_eq;

    fn fields(pairs: &[(&str, FieldValue)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_merge_is_union_with_delta_precedence() {
        let mut store = SnapshotStore::new();

        store.merge(
            "V1",
            fields(&[
                ("Soc", FieldValue::Number(70.0)),
                ("Odometer", FieldValue::Number(1000.0)),
            ]),
        );

        let merged = store
            .merge("V1", fields(&[("Soc", FieldValue::Number(71.0))]))
            .clone();

        // Delta value wins, unseen field persists.
        assert_eq!(merged.get("Soc"), Some(&FieldValue::Number(71.0)));
        assert_eq!(merged.get("Odometer"), Some(&FieldValue::Number(1000.0)));
    }

    #[test]
    fn test_vehicles_are_independent() {
        let mut store = SnapshotStore::new();
        store.merge("V1", fields(&[("Soc", FieldValue::Number(70.0))]));
        store.merge("V2", fields(&[("Soc", FieldValue::Number(30.0))]));

        assert_eq!(store.vehicle_count(), 2);
        assert_eq!(
            store.fields("V1").unwrap().get("Soc"),
            Some(&FieldValue::Number(70.0))
        );
        assert_eq!(
            store.fields("V2").unwrap().get("Soc"),
            Some(&FieldValue::Number(30.0))
        );
    }

    #[test]
    fn test_unknown_vehicle_has_no_fields() {
        let store = SnapshotStore::new();
        assert!(store.fields("V1").is_none());
        assert!(store.last_seen("V1").is_none());
    }

    #[test]
    fn test_mark_seen_tracks_activity() {
        let mut store = SnapshotStore::new();
        store.mark_seen("V1", 1_723_458_600_000);
        assert_eq!(store.last_seen("V1"), Some(1_723_458_600_000));

        store.mark_seen("V1", 1_723_458_601_000);
        assert_eq!(store.last_seen("V1"), Some(1_723_458_601_000));
    }
}
