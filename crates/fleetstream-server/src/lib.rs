//! # fleetstream-server
//!
//! Streaming WebSocket server for vehicle telemetry: subscriber routing,
//! the subscription auth gate and the decode/merge/compose fan-out path.

pub mod auth;
pub mod registry;
pub mod router;
pub mod server;

pub use auth::{AuthDecision, AuthError, AuthGate, HttpAuthorizer, VehicleAuthorizer};
pub use registry::{Outbound, SubscriberTx, SubscriptionRegistry};
pub use router::TelemetryRouter;
pub use server::{ServerConfig, ServerEvent, StreamServer};
