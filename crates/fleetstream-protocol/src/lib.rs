//! # fleetstream-protocol
//!
//! Streaming protocol message types and JSON codec for the WebSocket
//! connection between the bridge and its per-vehicle clients.

pub mod codec;
pub mod messages;

pub use codec::{decode_client_message, encode_server_message, CodecError};
pub use messages::{
    AuthErrorMessage, ClientMessage, ControlHello, ServerMessage, UpdateMessage,
    VehicleErrorMessage, VehicleErrorType, CONNECTION_TIMEOUT_MS, MSG_CONTROL_HELLO,
};
