//! MQTT telemetry ingestion.
//!
//! Subscribes to the fleet's wildcard vehicle topic and forwards every
//! publish payload into the server's event channel unchanged. Decoding
//! and validation happen downstream; a broker hiccup here is logged and
//! ridden out, never fatal.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use fleetstream_server::ServerEvent;

/// Configuration for the MQTT ingestion provider.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker hostname.
    pub broker_host: String,
    /// Broker port.
    pub broker_port: u16,
    /// Topic filter carrying per-vehicle telemetry events.
    pub topic: String,
    /// MQTT keep-alive interval.
    pub keep_alive: Duration,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Delay before polling again after a connection error.
    pub reconnect_delay: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "mosquitto".to_string(),
            broker_port: 1883,
            topic: "fleet/v/#".to_string(),
            keep_alive: Duration::from_secs(60),
            client_id: "fleetstream-ingest".to_string(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Errors from the MQTT provider's own operations.
///
/// Connection-level errors inside the poll loop are not surfaced here;
/// they are logged and retried.
#[derive(Debug, Error)]
pub enum MqttIngestError {
    #[error("mqtt subscribe failed: {0}")]
    Subscribe(#[from] rumqttc::ClientError),

    #[error("server event channel closed")]
    ChannelClosed,
}

/// MQTT ingestion provider.
///
/// Owns the broker connection and pumps publish payloads into the
/// server's event channel for the lifetime of the process.
pub struct MqttIngest {
    config: MqttConfig,
    event_tx: mpsc::Sender<ServerEvent>,
}

impl MqttIngest {
    pub fn new(config: MqttConfig, event_tx: mpsc::Sender<ServerEvent>) -> Self {
        Self { config, event_tx }
    }

    /// Run the ingestion loop. Returns only when the server's event
    /// channel closes.
    pub async fn run(self) -> Result<(), MqttIngestError> {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.broker_host.clone(),
            self.config.broker_port,
        );
        options.set_keep_alive(self.config.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(options, 64);
        info!(
            "MQTT ingest connecting to {}:{}",
            self.config.broker_host, self.config.broker_port
        );

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // Subscriptions do not survive a reconnect, so they
                    // are (re)issued on every ConnAck.
                    info!("Connected to MQTT broker, subscribing to {}", self.config.topic);
                    client
                        .subscribe(self.config.topic.clone(), QoS::AtMostOnce)
                        .await?;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                    debug!("Telemetry on {} ({} bytes)", publish.topic, payload.len());
                    if self
                        .event_tx
                        .send(ServerEvent::TelemetryReceived(payload))
                        .await
                        .is_err()
                    {
                        warn!("Server event channel closed, stopping MQTT ingest");
                        return Err(MqttIngestError::ChannelClosed);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {}", e);
                    tokio::time::sleep(self.config.reconnect_delay).await;
                }
            }
        }
    }
}
