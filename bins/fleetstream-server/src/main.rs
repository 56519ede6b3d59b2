use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetstream_providers::{MqttConfig, MqttIngest};
use fleetstream_server::{HttpAuthorizer, ServerConfig, StreamServer};
use fleetstream_web::{create_router, AdminState};

/// Read an environment variable with a fallback.
fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,fleetstream_server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("FleetStream server starting...");

    // Configuration
    let ws_addr: SocketAddr = env_or("FLEETSTREAM_WS_ADDR", "0.0.0.0:8081").parse()?;
    let http_addr: SocketAddr = env_or("FLEETSTREAM_HTTP_ADDR", "0.0.0.0:8080").parse()?;
    let auth_base_url = env_or("FLEETSTREAM_AUTH_URL", "http://teslamate-api:8002");

    let mqtt_config = MqttConfig {
        broker_host: env_or("FLEETSTREAM_MQTT_HOST", "mosquitto"),
        broker_port: env_or("FLEETSTREAM_MQTT_PORT", "1883").parse()?,
        topic: env_or("FLEETSTREAM_MQTT_TOPIC", "fleet/v/#"),
        ..MqttConfig::default()
    };

    let config = ServerConfig {
        name: "fleetstream".to_string(),
        bind_addr: ws_addr,
        keepalive_interval: Duration::from_secs(10),
        ..ServerConfig::default()
    };

    // Start WebSocket server
    let server = StreamServer::new(config, Arc::new(HttpAuthorizer::new(auth_base_url)));
    let event_tx = server.event_sender();

    // Shared with the admin surface
    let router = server.router();
    let registry = server.registry();

    // Spawn WebSocket server
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("WebSocket server error: {}", e);
        }
    });

    // Start admin HTTP server
    let http_handle = tokio::spawn(async move {
        let app = create_router(AdminState::new(router, registry));
        match tokio::net::TcpListener::bind(http_addr).await {
            Ok(listener) => {
                tracing::info!("Admin HTTP server listening on {}", http_addr);
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("Admin HTTP server error: {}", e);
                }
            }
            Err(e) => tracing::error!("Failed to bind admin HTTP server: {}", e),
        }
    });

    // Start MQTT ingestion
    let mqtt_handle = tokio::spawn(async move {
        let ingest = MqttIngest::new(mqtt_config, event_tx);
        if let Err(e) = ingest.run().await {
            tracing::error!("MQTT ingest stopped: {}", e);
        }
    });

    tracing::info!("FleetStream server ready");
    tracing::info!("   Streaming: ws://localhost:8081/streaming/");
    tracing::info!("   Admin:     http://localhost:8080/");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = ws_handle => {
            tracing::warn!("WebSocket server stopped");
        }
        _ = http_handle => {
            tracing::warn!("Admin HTTP server stopped");
        }
        _ = mqtt_handle => {
            tracing::warn!("MQTT ingest stopped");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
