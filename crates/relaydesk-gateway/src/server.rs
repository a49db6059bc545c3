// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use relaydesk_config::model::GatewayConfig;
use relaydesk_core::RelayError;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::ChallengeHandler;
use crate::handlers;
use crate::turnstile::TurnstileVerifier;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub handler: Arc<dyn ChallengeHandler>,
    /// Absent when no secret key is configured; every submission then fails.
    pub verifier: Option<Arc<TurnstileVerifier>>,
    /// Public site key embedded in the challenge widget.
    pub site_key: Option<String>,
}

/// Bind address of the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// All gateway routes.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/verify", get(handlers::verify_page))
        .route("/submit_token", post(handlers::submit_token))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the gateway until `shutdown` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| RelayError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_from_gateway_config() {
        let config = ServerConfig::from(&GatewayConfig::default());
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8787);
        assert!(format!("{config:?}").contains("127.0.0.1"));
    }
}
