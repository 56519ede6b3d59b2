//! Telemetry pipeline orchestration.
//!
//! Wires decode → snapshot merge → compose → registry delivery for every
//! inbound telemetry event, plus the administrative message synthesis used
//! by the control surface. All per-event failures are local: a malformed
//! event is logged and dropped without touching any state.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use fleetstream_core::{compose_value, decode_envelope, extract_event, SnapshotStore};
use fleetstream_protocol::{
    encode_server_message, ServerMessage, UpdateMessage, VehicleErrorMessage, VehicleErrorType,
};

use crate::registry::SubscriptionRegistry;

/// Orchestrator for the telemetry fan-out path.
///
/// Owns the snapshot store; the registry is shared with the connection
/// handlers. Both are injected at construction so the concurrency
/// discipline stays auditable - there is no ambient global state.
pub struct TelemetryRouter {
    snapshots: RwLock<SnapshotStore>,
    registry: Arc<SubscriptionRegistry>,
}

impl TelemetryRouter {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            snapshots: RwLock::new(SnapshotStore::new()),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Process one raw telemetry payload from the transport.
    ///
    /// Vehicles in raw-passthrough mode receive the parsed event
    /// verbatim, bypassing field extraction, snapshot and composer
    /// entirely; only the envelope (valid JSON with a vin) is required.
    /// Otherwise the delta is merged into the snapshot and a positional
    /// update is delivered once the completeness gate passes.
    pub async fn ingest(&self, payload: &str) {
        let envelope = match decode_envelope(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping telemetry event: {}", e);
                return;
            }
        };

        if self.registry.is_raw(&envelope.vin).await {
            let vin = envelope.vin.clone();
            self.send(&vin, ServerMessage::Raw(envelope.raw)).await;
            return;
        }

        let event = match extract_event(envelope) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping telemetry event: {}", e);
                return;
            }
        };

        let vin = event.vin;
        let value = {
            let mut snapshots = self.snapshots.write().await;
            let merged = snapshots.merge(&vin, event.fields);
            let value = compose_value(merged, event.created_at_ms);
            snapshots.mark_seen(&vin, Utc::now().timestamp_millis());
            value
        };

        match value {
            Some(value) => {
                self.send(&vin, ServerMessage::Update(UpdateMessage::new(&vin, value)))
                    .await;
            }
            None => {
                debug!("Snapshot for {} still incomplete, absorbing event", vin);
            }
        }
    }

    /// Synthesize a `data:update` for a vehicle (administrative surface).
    /// `body` is appended after the current epoch-millis timestamp slot.
    pub async fn send_update(&self, tag: &str, body: &str) -> bool {
        let value = format!("{},{}", Utc::now().timestamp_millis(), body);
        self.send(tag, ServerMessage::Update(UpdateMessage::new(tag, value)))
            .await
    }

    /// Synthesize a `data:error` for a vehicle (administrative surface).
    pub async fn send_vehicle_error(
        &self,
        tag: &str,
        error_type: VehicleErrorType,
        value: Option<String>,
    ) -> bool {
        let msg = ServerMessage::VehicleError(VehicleErrorMessage::new(tag, error_type, value));
        self.send(tag, msg).await
    }

    /// Last recorded telemetry activity for a vehicle, epoch millis.
    pub async fn last_seen(&self, vin: &str) -> Option<i64> {
        self.snapshots.read().await.last_seen(vin)
    }

    async fn send(&self, tag: &str, msg: ServerMessage) -> bool {
        match encode_server_message(&msg) {
            Ok(frame) => self.registry.deliver(tag, frame).await,
            Err(e) => {
                error!("Failed to encode message for {}: {}", tag, e);
                false
            }
        }
    }
}
