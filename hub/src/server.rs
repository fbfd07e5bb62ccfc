//! HTTP server wrapping the WebSocket hub.
//!
//! Exposes the `/ws` upgrade route and handles graceful shutdown: on
//! ctrl-c the hub closes every session before the listener is released.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::HubError;
use crate::ws::handler::{ws_handler, WsState};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl ServerConfig {
    /// Creates a new server configuration.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("0.0.0.0", 8080)
    }
}

/// Builds the hub router.
#[must_use]
pub fn router(state: WsState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The hub server.
pub struct Server {
    config: ServerConfig,
    state: WsState,
}

impl Server {
    /// Creates a new server.
    #[must_use]
    pub fn new(config: ServerConfig, state: WsState) -> Self {
        Self { config, state }
    }

    /// Runs the server until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns an error if binding or serving fails.
    pub async fn run(self) -> Result<(), HubError> {
        let hub = self.state.hub.clone();
        hub.start_liveness().await;

        let app = router(self.state);
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;

        info!(host = %self.config.host, port = self.config.port, "hub listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                hub.shutdown().await;
            })
            .await?;

        Ok(())
    }
}
