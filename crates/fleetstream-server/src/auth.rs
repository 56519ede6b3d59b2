//! Subscription authorization.
//!
//! The authorized subscribe path validates the client's token against an
//! external vehicle-authorization service. Known-bad (vehicle, token)
//! pairs are cached for the process lifetime so a misbehaving client does
//! not hammer the service; transport failures fail closed but are NOT
//! cached, so the next attempt retries.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Default bound on the external authorization call.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a subscription request was denied.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token is missing or empty")]
    MissingToken,

    #[error("Token invalid (already tried)")]
    PreviouslyInvalid,

    /// The authorization service rejected the token; carries its response
    /// body verbatim.
    #[error("{0}")]
    Rejected(String),

    /// The authorization service could not be reached. Fail closed, but
    /// eligible for retry on the next attempt.
    #[error("authorization service unreachable: {0}")]
    Transport(String),

    #[error("authorization timed out after {0:?}")]
    Timeout(Duration),
}

/// Verdict from the external authorization service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    /// Rejection with the service's response body.
    Rejected(String),
}

/// Seam to the external vehicle-authorization service.
#[async_trait]
pub trait VehicleAuthorizer: Send + Sync {
    /// Check whether `token` grants streaming access to `vin`.
    /// `Err` means the service could not be consulted at all.
    async fn check(&self, vin: &str, token: &str) -> anyhow::Result<AuthDecision>;
}

/// HTTP implementation of [`VehicleAuthorizer`].
pub struct HttpAuthorizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthorizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VehicleAuthorizer for HttpAuthorizer {
    async fn check(&self, vin: &str, token: &str) -> anyhow::Result<AuthDecision> {
        let url = format!(
            "{}/api/1/vehicles/{}",
            self.base_url.trim_end_matches('/'),
            vin
        );
        let response = self
            .client
            .get(&url)
            .query(&[("token", token)])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(AuthDecision::Allowed)
        } else {
            let body = response.text().await.unwrap_or_default();
            Ok(AuthDecision::Rejected(body))
        }
    }
}

/// Gate between subscription requests and the authorization service.
///
/// The invalid-token cache grows for the process lifetime; it is keyed by
/// (vehicle, token) so one vehicle's bad token never affects another's.
pub struct AuthGate {
    authorizer: Arc<dyn VehicleAuthorizer>,
    invalid: RwLock<HashSet<(String, String)>>,
    timeout: Duration,
}

impl AuthGate {
    pub fn new(authorizer: Arc<dyn VehicleAuthorizer>, timeout: Duration) -> Self {
        Self {
            authorizer,
            invalid: RwLock::new(HashSet::new()),
            timeout,
        }
    }

    /// Validate a subscription request.
    ///
    /// The connection's handshake blocks on this call, so the external
    /// check is bounded by the configured timeout. No lock is held across
    /// it.
    pub async fn authorize(&self, vin: &str, token: Option<&str>) -> Result<(), AuthError> {
        let token = token.unwrap_or("").trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let key = (vin.to_string(), token.to_string());
        if self.invalid.read().await.contains(&key) {
            debug!("Rejected cached invalid token for {}", vin);
            return Err(AuthError::PreviouslyInvalid);
        }

        match tokio::time::timeout(self.timeout, self.authorizer.check(vin, token)).await {
            Ok(Ok(AuthDecision::Allowed)) => Ok(()),
            Ok(Ok(AuthDecision::Rejected(body))) => {
                self.invalid.write().await.insert(key);
                Err(AuthError::Rejected(body))
            }
            Ok(Err(e)) => {
                warn!("Authorization call failed for {}: {}", vin, e);
                Err(AuthError::Transport(e.to_string()))
            }
            Err(_) => {
                warn!("Authorization call timed out for {}", vin);
                Err(AuthError::Timeout(self.timeout))
            }
        }
    }
}
