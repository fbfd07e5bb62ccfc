//! Tradewire hub server binary.
//!
//! Entry point for the WebSocket hub.

use std::env;
use std::sync::Arc;

use tradewire_hub::{
    ConnectionHub, HubConfig, Identity, Server, ServerConfig, StaticTokenVerifier, WsState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tradewire_hub=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let host = env::var("HUB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("HUB_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .expect("HUB_PORT must be a valid port number");
    let dev_token = env::var("HUB_DEV_TOKEN").unwrap_or_else(|_| "dev-token".to_string());

    let hub_config = HubConfig::default();
    hub_config.validate()?;

    // Deployments inject a verifier backed by the identity service; the
    // static token keeps local development self-contained.
    let verifier = Arc::new(
        StaticTokenVerifier::new().with_token(dev_token, Identity::new(1, "dev@tradewire.local")),
    );

    let hub = ConnectionHub::new(hub_config);
    let state = WsState::new(hub, verifier);

    let config = ServerConfig::new(host, port);
    tracing::info!(
        "Starting Tradewire hub on {}:{}",
        config.host,
        config.port
    );

    let server = Server::new(config, state);
    server.run().await?;

    Ok(())
}
