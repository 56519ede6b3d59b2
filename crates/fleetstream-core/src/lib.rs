//! # fleetstream-core
//!
//! Core telemetry model, decoding and composition for the fleet streaming
//! bridge.
//!
//! This crate provides:
//! - Telemetry event model types (event, data points, field values)
//! - Decoding of raw feed payloads into normalized field maps
//! - Per-vehicle snapshot accumulation (the feed only sends changed fields)
//! - Composition of the positional streaming message with its completeness gate
//!
//! This crate is intentionally runtime-agnostic and contains no async code
//! or I/O; subscriber routing and transports live in `fleetstream-server`.

pub mod compose;
pub mod decode;
pub mod snapshot;
pub mod telemetry;

pub use compose::{compose_value, is_complete, VALUE_SLOTS};
pub use decode::{decode_envelope, decode_event, extract_event, DecodeError, DecodedEvent, Envelope};
pub use snapshot::SnapshotStore;
pub use telemetry::{
    DatumValue, FieldMap, FieldValue, LocationValue, TelemetryDatum, TelemetryEvent,
};
