//! Protocol message types for the streaming WebSocket connection.
//!
//! This module defines all message types exchanged with streaming clients:
//! - Server → Client: control hello (also the keep-alive), subscribe acks,
//!   auth errors, data updates, vehicle errors, raw passthrough
//! - Client → Server: subscribe requests
//!
//! Messages are serialized as JSON over WebSocket text frames. Every
//! message carries a `msg_type` discriminator on the wire.

use serde::{Deserialize, Serialize};

/// Connection timeout advertised to clients, in milliseconds.
///
/// Clients treat the connection as dead when no message arrives within
/// this window; the keep-alive interval must stay well below it.
pub const CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// `msg_type` of the plain control hello (keep-alive and oauth ack).
pub const MSG_CONTROL_HELLO: &str = "control:hello";

/// Messages received from streaming clients.
///
/// Anything with an unknown `msg_type` fails deserialization and is
/// ignored by the connection handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "msg_type")]
pub enum ClientMessage {
    /// Subscribe on the trusted path; no authorization check is performed.
    #[serde(rename = "data:subscribe_oauth")]
    SubscribeOauth {
        tag: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Subscribe on the authorized path; the token is validated against
    /// the external authorization service and, on success, the vehicle is
    /// switched to raw passthrough for the connection's lifetime.
    #[serde(rename = "data:subscribe_all")]
    SubscribeAll {
        tag: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

impl ClientMessage {
    /// Vehicle identifier the request targets.
    pub fn tag(&self) -> &str {
        match self {
            ClientMessage::SubscribeOauth { tag, .. } => tag,
            ClientMessage::SubscribeAll { tag, .. } => tag,
        }
    }
}

/// Control hello: sent unsolicited as a keep-alive every interval, and as
/// the acknowledgement of a successful subscribe. The authorized path acks
/// with `control:hello:<VIN>` rather than the plain hello.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlHello {
    pub msg_type: String,
    pub connection_timeout: u64,
}

impl ControlHello {
    /// Plain hello, used for keep-alives and the oauth-path ack.
    pub fn new() -> Self {
        Self {
            msg_type: MSG_CONTROL_HELLO.to_string(),
            connection_timeout: CONNECTION_TIMEOUT_MS,
        }
    }

    /// Ack for an authorized subscribe, tagged with the vehicle identifier.
    pub fn for_vehicle(tag: &str) -> Self {
        Self {
            msg_type: format!("{MSG_CONTROL_HELLO}:{tag}"),
            connection_timeout: CONNECTION_TIMEOUT_MS,
        }
    }
}

impl Default for ControlHello {
    fn default() -> Self {
        Self::new()
    }
}

/// Auth failure notification, sent before the server closes the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthErrorMessage {
    pub msg_type: String,
    pub error_detail: String,
    pub connection_timeout: u64,
}

impl AuthErrorMessage {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            msg_type: "error".to_string(),
            error_detail: detail.into(),
            connection_timeout: CONNECTION_TIMEOUT_MS,
        }
    }
}

/// Telemetry update for one vehicle.
///
/// `value` is the comma-joined positional string composed by
/// `fleetstream_core::compose_value`; its slot order is a wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub msg_type: String,
    pub tag: String,
    pub value: String,
}

impl UpdateMessage {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            msg_type: "data:update".to_string(),
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// Kind of vehicle-level error surfaced to a streaming client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleErrorType {
    #[serde(rename = "vehicle_error")]
    VehicleError,
    #[serde(rename = "vehicle_disconnected")]
    VehicleDisconnected,
}

/// Vehicle error notification for one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleErrorMessage {
    pub msg_type: String,
    pub tag: String,
    pub error_type: VehicleErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl VehicleErrorMessage {
    pub fn new(
        tag: impl Into<String>,
        error_type: VehicleErrorType,
        value: Option<String>,
    ) -> Self {
        Self {
            msg_type: "data:error".to_string(),
            tag: tag.into(),
            error_type,
            value,
        }
    }
}

/// Messages that can be sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Keep-alive and subscribe acknowledgement.
    Hello(ControlHello),

    /// Auth failure, followed by a server-initiated close.
    AuthError(AuthErrorMessage),

    /// Telemetry update.
    Update(UpdateMessage),

    /// Vehicle error.
    VehicleError(VehicleErrorMessage),

    /// Decoded telemetry event forwarded verbatim (raw passthrough mode).
    Raw(serde_json::Value),
}
