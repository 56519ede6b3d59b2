//! # fleetstream-providers
//!
//! Telemetry feed providers for the FleetStream server.
//!
//! Currently one provider: MQTT ingestion from the fleet telemetry
//! broker. Providers push raw payloads into the server's event channel;
//! all decoding happens server-side.

pub mod mqtt;

pub use mqtt::{MqttConfig, MqttIngest, MqttIngestError};
