//! Streaming WebSocket server.
//!
//! This module provides the server that handles:
//! - Client connections and the subscribe handshake
//! - Periodic keep-alive hello messages
//! - Telemetry event ingestion and per-vehicle delivery

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use fleetstream_protocol::{
    decode_client_message, encode_server_message, AuthErrorMessage, ClientMessage, ControlHello,
    ServerMessage,
};

use crate::auth::{AuthGate, VehicleAuthorizer, DEFAULT_AUTH_TIMEOUT};
use crate::registry::{Outbound, SubscriberTx, SubscriptionRegistry};
use crate::router::TelemetryRouter;

/// Monotonic connection ids, used for replacement-safe unsubscription.
static CONNECTION_IDS: AtomicU64 = AtomicU64::new(1);

/// Configuration for the streaming server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name used in logs.
    pub name: String,
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Interval between unsolicited keep-alive hello messages.
    pub keepalive_interval: Duration,
    /// Bound on the external authorization call during the handshake.
    pub auth_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "fleetstream".to_string(),
            bind_addr: "0.0.0.0:8081".parse().unwrap(),
            keepalive_interval: Duration::from_secs(10),
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }
}

/// Events that can be sent to the server.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A raw telemetry payload was received from the transport.
    TelemetryReceived(String),
}

/// The streaming WebSocket server.
pub struct StreamServer {
    config: ServerConfig,
    registry: Arc<SubscriptionRegistry>,
    router: Arc<TelemetryRouter>,
    auth: Arc<AuthGate>,
    /// Channel for receiving events from providers.
    event_tx: mpsc::Sender<ServerEvent>,
    event_rx: mpsc::Receiver<ServerEvent>,
}

impl StreamServer {
    /// Create a new server with the given configuration and authorization
    /// collaborator.
    pub fn new(config: ServerConfig, authorizer: Arc<dyn VehicleAuthorizer>) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let router = Arc::new(TelemetryRouter::new(registry.clone()));
        let auth = Arc::new(AuthGate::new(authorizer, config.auth_timeout));
        let (event_tx, event_rx) = mpsc::channel(1024);

        Self {
            config,
            registry,
            router,
            auth,
            event_tx,
            event_rx,
        }
    }

    /// Get a sender for submitting events to the server.
    pub fn event_sender(&self) -> mpsc::Sender<ServerEvent> {
        self.event_tx.clone()
    }

    /// The telemetry pipeline, shared with the administrative surface.
    pub fn router(&self) -> Arc<TelemetryRouter> {
        self.router.clone()
    }

    /// The subscriber registry, shared with the administrative surface.
    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        self.registry.clone()
    }

    /// Run the server, listening for WebSocket connections.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let StreamServer {
            config,
            registry,
            router,
            auth,
            // Kept alive so the event channel stays open even when no
            // provider is attached.
            event_tx: _event_tx,
            mut event_rx,
        } = self;

        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!(
            "{} streaming server listening on {}",
            config.name, config.bind_addr
        );

        // Event processor: telemetry events are handled serially, one
        // decode-merge-compose-deliver cycle at a time.
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    ServerEvent::TelemetryReceived(payload) => {
                        router.ingest(&payload).await;
                    }
                }
            }
        });

        // Accept connections
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let config = config.clone();
                    let registry = registry.clone();
                    let auth = auth.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, config, registry, auth).await
                        {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Handle a single client WebSocket connection.
///
/// The keep-alive timer, inbound messages and the registry's outbound
/// channel are multiplexed in one select loop, so exiting the loop stops
/// the keep-alive deterministically. On exit, every registry entry still
/// owned by this connection is swept out by connection id.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: ServerConfig,
    registry: Arc<SubscriptionRegistry>,
    auth: Arc<AuthGate>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("New streaming connection from {}", addr);

    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let conn_id = CONNECTION_IDS.fetch_add(1, Ordering::Relaxed);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

    // First hello goes out after one full period, matching the keep-alive
    // contract rather than greeting on connect.
    let period = config.keepalive_interval;
    let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = keepalive.tick() => {
                let frame = encode_server_message(&ServerMessage::Hello(ControlHello::new()))?;
                if let Err(e) = ws_tx.send(Message::Text(frame)).await {
                    debug!("Keep-alive to {} failed: {}", addr, e);
                    break;
                }
            }

            // Frames routed to this connection's subscribed vehicle.
            out = out_rx.recv() => {
                match out {
                    Some(Outbound::Frame(frame)) => {
                        if let Err(e) = ws_tx.send(Message::Text(frame)).await {
                            error!("Failed to send to {}: {}", addr, e);
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        info!("Kicking connection {}", addr);
                        ws_tx.send(Message::Close(None)).await.ok();
                        break;
                    }
                    // We hold a sender ourselves, so the channel cannot close.
                    None => break,
                }
            }

            // Handle incoming messages from the client.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let keep_open = handle_client_message(
                            &text,
                            conn_id,
                            &out_tx,
                            &registry,
                            &auth,
                            &mut ws_tx,
                        )
                        .await?;
                        if !keep_open {
                            ws_tx.send(Message::Close(None)).await.ok();
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} closed connection", addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_tx.send(Message::Pong(data)).await?;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} disconnected", addr);
                        break;
                    }
                    _ => {} // Ignore other message types
                }
            }
        }
    }

    // The keep-alive timer dies with this task; registry entries must
    // not outlive the connection either. A connection may have
    // subscribed more than one vehicle over its lifetime, so teardown
    // sweeps by connection id rather than tracking individual vins.
    registry.remove_connection(conn_id).await;

    Ok(())
}

/// Handle a message received from a client. Returns whether the connection
/// should stay open.
async fn handle_client_message(
    text: &str,
    conn_id: u64,
    out_tx: &SubscriberTx,
    registry: &Arc<SubscriptionRegistry>,
    auth: &Arc<AuthGate>,
    ws_tx: &mut SplitSink<WebSocketStream<TcpStream>, Message>,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let msg = match decode_client_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Ignoring unrecognized client message: {}", e);
            return Ok(true);
        }
    };

    match msg {
        ClientMessage::SubscribeOauth { tag, .. } => {
            // Trusted path: no authorization check is performed here; the
            // oauth handshake is gated upstream of this bridge.
            info!("Subscribe from {}", tag);
            registry.subscribe(&tag, out_tx.clone(), false, conn_id).await;

            let ack = encode_server_message(&ServerMessage::Hello(ControlHello::new()))?;
            ws_tx.send(Message::Text(ack)).await?;
            Ok(true)
        }
        ClientMessage::SubscribeAll { tag, token } => {
            info!("Subscribe (authorized) from {}", tag);
            match auth.authorize(&tag, token.as_deref()).await {
                Ok(()) => {
                    registry.subscribe(&tag, out_tx.clone(), true, conn_id).await;

                    let ack = encode_server_message(&ServerMessage::Hello(
                        ControlHello::for_vehicle(&tag),
                    ))?;
                    ws_tx.send(Message::Text(ack)).await?;
                    Ok(true)
                }
                Err(denied) => {
                    error!("Subscription denied for {}: {}", tag, denied);
                    let frame = encode_server_message(&ServerMessage::AuthError(
                        AuthErrorMessage::new(denied.to_string()),
                    ))?;
                    ws_tx.send(Message::Text(frame)).await?;
                    // Caller closes the connection.
                    Ok(false)
                }
            }
        }
    }
}
