//! WebSocket message codec.
//!
//! The streaming protocol is JSON over WebSocket text frames. This module
//! provides encoding and decoding utilities for the protocol messages.

use crate::messages::{ClientMessage, ServerMessage};
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("Failed to serialize message: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Encode a server message to JSON string for WebSocket transmission.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::from)
}

/// Decode a client message from JSON string received over WebSocket.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ControlHello, UpdateMessage};

    #[test]
    fn test_encode_hello() {
        let msg = ServerMessage::Hello(ControlHello::new());
        let json = encode_server_message(&msg).unwrap();
        assert!(json.contains("\"msg_type\":\"control:hello\""));
    }

    #[test]
    fn test_encode_update() {
        let msg = ServerMessage::Update(UpdateMessage::new("V1", "1,2,3"));
        let json = encode_server_message(&msg).unwrap();
        assert!(json.contains("\"tag\":\"V1\""));
        assert!(json.contains("\"value\":\"1,2,3\""));
    }

    #[test]
    fn test_encode_raw_is_verbatim() {
        let raw = serde_json::json!({"vin": "V1", "data": [{"key": "Soc"}]});
        let msg = ServerMessage::Raw(raw.clone());
        let json = encode_server_message(&msg).unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&json).unwrap(),
            raw
        );
    }

    #[test]
    fn test_decode_subscribe() {
        let json = r#"{"msg_type":"data:subscribe_all","tag":"V1","token":"t"}"#;
        let msg = decode_client_message(json).unwrap();
        assert_eq!(msg.tag(), "V1");
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_client_message("{ nope").is_err());
    }
}
