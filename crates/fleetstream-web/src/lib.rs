//! # fleetstream-web
//!
//! Health check and administrative HTTP surface for the FleetStream
//! server.
//!
//! Two endpoints:
//! - `GET /` - liveness check, returns a static OK status
//! - `GET /send` - synthesizes protocol messages for a vehicle or kicks
//!   its connection; thin shim over the router and registry operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleetstream_web::{create_router, AdminState};
//!
//! let app = create_router(AdminState::new(router, registry));
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::info;

use fleetstream_protocol::VehicleErrorType;
use fleetstream_server::{SubscriptionRegistry, TelemetryRouter};

/// Shared state for the administrative handlers.
#[derive(Clone)]
pub struct AdminState {
    router: Arc<TelemetryRouter>,
    registry: Arc<SubscriptionRegistry>,
}

impl AdminState {
    pub fn new(router: Arc<TelemetryRouter>, registry: Arc<SubscriptionRegistry>) -> Self {
        Self { router, registry }
    }
}

/// Create the admin router.
pub fn create_router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/send", get(send_handler))
        .with_state(state)
}

/// Handler for the `/` liveness endpoint.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Query parameters accepted by `/send`.
///
/// `tag` selects the vehicle; the remaining parameters each trigger an
/// independent action and may be combined in one request.
#[derive(Debug, Deserialize)]
struct SendParams {
    tag: Option<String>,
    /// Update body, appended after the server-side timestamp slot.
    msg: Option<String>,
    /// Any value: synthesize a "Vehicle is offline" error.
    offline: Option<String>,
    /// Any value: synthesize a vehicle_disconnected error.
    disconnect: Option<String>,
    /// Any value: close the vehicle's active connection.
    kick: Option<String>,
}

/// Handler for the `/send` administrative endpoint.
///
/// Always responds with the OK status; actions on vehicles without an
/// active subscriber are silent no-ops, same as the delivery path.
async fn send_handler(
    State(state): State<AdminState>,
    Query(params): Query<SendParams>,
) -> Json<serde_json::Value> {
    if let Some(tag) = &params.tag {
        if let Some(msg) = &params.msg {
            info!("Admin update for {}", tag);
            state.router.send_update(tag, msg).await;
        }
        if params.offline.is_some() {
            info!("Admin offline error for {}", tag);
            state
                .router
                .send_vehicle_error(
                    tag,
                    VehicleErrorType::VehicleError,
                    Some("Vehicle is offline".to_string()),
                )
                .await;
        }
        if params.disconnect.is_some() {
            info!("Admin disconnect error for {}", tag);
            state
                .router
                .send_vehicle_error(tag, VehicleErrorType::VehicleDisconnected, None)
                .await;
        }
        if params.kick.is_some() {
            info!("Admin kick for {}", tag);
            state.registry.kick(tag).await;
        }
    }

    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetstream_server::Outbound;
    use tokio::sync::mpsc;

    async fn state_with_subscriber(
        vin: &str,
    ) -> (AdminState, mpsc::UnboundedReceiver<Outbound>) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let router = Arc::new(TelemetryRouter::new(registry.clone()));
        let (tx, rx) = mpsc::unbounded_channel();
        registry.subscribe(vin, tx, false, 1).await;
        (AdminState::new(router, registry), rx)
    }

    fn recv_json(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> serde_json::Value {
        match rx.try_recv() {
            Ok(Outbound::Frame(frame)) => serde_json::from_str(&frame).unwrap(),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    fn params(
        tag: Option<&str>,
        msg: Option<&str>,
        offline: bool,
        disconnect: bool,
        kick: bool,
    ) -> SendParams {
        SendParams {
            tag: tag.map(String::from),
            msg: msg.map(String::from),
            offline: offline.then(|| "1".to_string()),
            disconnect: disconnect.then(|| "1".to_string()),
            kick: kick.then(|| "1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_health_handler() {
        let res = health_handler().await;
        assert_eq!(res.0["status"], "ok");
    }

    #[tokio::test]
    async fn test_send_msg_synthesizes_update() {
        let (state, mut rx) = state_with_subscriber("V1").await;

        let res = send_handler(
            State(state),
            Query(params(Some("V1"), Some("0,123,45,,,,,0,D,,,"), false, false, false)),
        )
        .await;
        assert_eq!(res.0["status"], "ok");

        let msg = recv_json(&mut rx);
        assert_eq!(msg["msg_type"], "data:update");
        assert_eq!(msg["tag"], "V1");
    }

    #[tokio::test]
    async fn test_send_offline_and_disconnect_errors() {
        let (state, mut rx) = state_with_subscriber("V1").await;

        send_handler(
            State(state.clone()),
            Query(params(Some("V1"), None, true, false, false)),
        )
        .await;
        let msg = recv_json(&mut rx);
        assert_eq!(msg["msg_type"], "data:error");
        assert_eq!(msg["error_type"], "vehicle_error");
        assert_eq!(msg["value"], "Vehicle is offline");

        send_handler(
            State(state),
            Query(params(Some("V1"), None, false, true, false)),
        )
        .await;
        let msg = recv_json(&mut rx);
        assert_eq!(msg["error_type"], "vehicle_disconnected");
        assert!(msg.get("value").is_none());
    }

    #[tokio::test]
    async fn test_send_kick_closes_connection() {
        let (state, mut rx) = state_with_subscriber("V1").await;

        send_handler(
            State(state),
            Query(params(Some("V1"), None, false, false, true)),
        )
        .await;
        assert!(matches!(rx.try_recv(), Ok(Outbound::Close)));
    }

    #[tokio::test]
    async fn test_send_without_tag_is_a_no_op() {
        let (state, mut rx) = state_with_subscriber("V1").await;

        let res = send_handler(
            State(state),
            Query(params(None, Some("ignored"), true, true, true)),
        )
        .await;
        assert_eq!(res.0["status"], "ok");
        assert!(rx.try_recv().is_err());
    }
}
