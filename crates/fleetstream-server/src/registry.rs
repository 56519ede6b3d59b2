//! Subscriber routing for streaming clients.
//!
//! Every outbound telemetry message passes through the registry: it maps
//! each vehicle identifier to at most one active client connection, plus
//! the raw-passthrough flag for vehicles subscribed via the authorized
//! path. A vehicle without a live subscriber is a silent drop, not an
//! error.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Items pushed to a connection's outbound channel.
#[derive(Debug)]
pub enum Outbound {
    /// A serialized protocol frame to forward to the client.
    Frame(String),
    /// Close the connection (administrative kick).
    Close,
}

/// Sending half of a connection's outbound channel.
pub type SubscriberTx = mpsc::UnboundedSender<Outbound>;

#[derive(Debug)]
struct Subscriber {
    tx: SubscriberTx,
    raw: bool,
    conn_id: u64,
}

/// Vehicle identifier → active client connection.
///
/// A new subscribe for an already-subscribed vehicle replaces the prior
/// entry; there is no multiplexing. The connection id stored with each
/// entry lets a closing connection remove exactly its own entry even when
/// it has since been replaced.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    inner: RwLock<HashMap<String, Subscriber>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the active connection for a vehicle. `raw` marks
    /// the vehicle for raw passthrough for the connection's lifetime.
    pub async fn subscribe(&self, vin: &str, tx: SubscriberTx, raw: bool, conn_id: u64) {
        let mut map = self.inner.write().await;
        let prior = map.insert(vin.to_string(), Subscriber { tx, raw, conn_id });
        if prior.is_some() {
            debug!("Replaced active subscriber for {}", vin);
        }
    }

    /// Remove every entry owned by `conn_id`. Called when a connection
    /// closes; the by-value sweep catches every vehicle the connection
    /// ever subscribed, and leaves entries that have since been replaced
    /// by another connection untouched.
    pub async fn remove_connection(&self, conn_id: u64) {
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, s| s.conn_id != conn_id);
        if map.len() < before {
            info!("Removed {} subscription(s) for closed connection", before - map.len());
        }
    }

    /// Send a serialized frame to the vehicle's active connection.
    /// Returns whether a live subscriber accepted it.
    pub async fn deliver(&self, vin: &str, frame: String) -> bool {
        let map = self.inner.read().await;
        match map.get(vin) {
            Some(sub) => sub.tx.send(Outbound::Frame(frame)).is_ok(),
            None => false,
        }
    }

    /// Forcibly close the vehicle's active connection, if any.
    pub async fn kick(&self, vin: &str) -> bool {
        let map = self.inner.read().await;
        map.get(vin)
            .map(|s| s.tx.send(Outbound::Close).is_ok())
            .unwrap_or(false)
    }

    /// Whether the vehicle's active subscriber requested raw passthrough.
    pub async fn is_raw(&self, vin: &str) -> bool {
        self.inner
            .read()
            .await
            .get(vin)
            .map(|s| s.raw)
            .unwrap_or(false)
    }

    /// Number of currently subscribed vehicles.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (SubscriberTx, mpsc::UnboundedReceiver<Outbound>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_subscribe_replaces_prior_connection() {
        let registry = SubscriptionRegistry::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();

        registry.subscribe("V1", tx1, false, 1).await;
        registry.subscribe("V1", tx2, false, 2).await;

        assert!(registry.deliver("V1", "hello".into()).await);
        assert!(matches!(rx2.try_recv(), Ok(Outbound::Frame(f)) if f == "hello"));
        assert!(rx1.try_recv().is_err());
        assert_eq!(registry.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_deliver_without_subscriber_is_silent() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.deliver("V1", "hello".into()).await);
    }

    #[tokio::test]
    async fn test_remove_connection_is_replacement_safe() {
        let registry = SubscriptionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, mut rx2) = channel();

        registry.subscribe("V1", tx1, false, 1).await;
        registry.subscribe("V1", tx2, false, 2).await;

        // Connection 1 closing must not evict connection 2's entry.
        registry.remove_connection(1).await;
        assert!(registry.deliver("V1", "still here".into()).await);
        assert!(rx2.try_recv().is_ok());

        registry.remove_connection(2).await;
        assert!(!registry.deliver("V1", "gone".into()).await);
    }

    #[tokio::test]
    async fn test_remove_connection_sweeps_every_owned_entry() {
        let registry = SubscriptionRegistry::new();
        let (tx, _rx) = channel();
        registry.subscribe("V1", tx.clone(), false, 7).await;
        registry.subscribe("V2", tx, false, 7).await;

        registry.remove_connection(7).await;
        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_kick_signals_close() {
        let registry = SubscriptionRegistry::new();
        let (tx, mut rx) = channel();
        registry.subscribe("V1", tx, false, 1).await;

        assert!(registry.kick("V1").await);
        assert!(matches!(rx.try_recv(), Ok(Outbound::Close)));
        assert!(!registry.kick("V2").await);
    }

    #[tokio::test]
    async fn test_raw_flag_tracks_active_subscriber() {
        let registry = SubscriptionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert!(!registry.is_raw("V1").await);

        registry.subscribe("V1", tx1, true, 1).await;
        assert!(registry.is_raw("V1").await);

        // Replacement without raw mode clears the flag.
        registry.subscribe("V1", tx2, false, 2).await;
        assert!(!registry.is_raw("V1").await);
    }

    #[tokio::test]
    async fn test_deliver_to_dropped_receiver_fails() {
        let registry = SubscriptionRegistry::new();
        let (tx, rx) = channel();
        registry.subscribe("V1", tx, false, 1).await;
        drop(rx);
        assert!(!registry.deliver("V1", "x".into()).await);
    }
}
