//! Bazaar Landing Service
//!
//! Confirms provider-redirected payments against the marketplace backend.

use bazaar_core::HttpMarketplaceClient;
use bazaar_landing::{config::LandingConfig, router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = LandingConfig::from_env().map_err(|e| {
        tracing::error!("invalid configuration: {}", e);
        e
    })?;

    tracing::info!("Marketplace backend: {}", config.backend_url);
    tracing::info!(
        "Polling up to {} times every {:?}",
        config.poll.max_attempts,
        config.poll.interval
    );
    tracing::info!("Sessions kept for {:?}", config.session_ttl);

    let api = HttpMarketplaceClient::with_endpoints(config.backend_url.clone(), config.endpoints);
    let state = AppState::new(Arc::new(api), config.poll).with_session_ttl(config.session_ttl);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Landing service starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
