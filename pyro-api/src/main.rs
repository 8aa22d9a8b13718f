//! pyro-api - Wildfire Risk Analysis Service
//!
//! Accepts a coordinate in the Hawaiian Islands, fans out to the
//! satellite-vegetation, weather, and power-infrastructure providers,
//! fuses the observations into a composite risk assessment, streams
//! progress over SSE, and files an incident ticket when the risk level
//! clears the configured threshold.

use anyhow::Result;
use tracing::info;

use pyro_api::{build_router, AppState};
use pyro_common::config::TomlConfig;
use pyro_api::providers::ProviderSet;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting PyroGuard Sentinel risk analysis service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TomlConfig::load()?;
    let bind_addr = config.server.bind_addr.clone();

    info!(
        "Analysis budget: {}s, ticket threshold: {}",
        config.analysis.budget_secs, config.risk.ticket_threshold
    );
    if config.providers.webhook_url.is_none() {
        info!("Incident webhook not configured; tickets will use estimated URLs");
    }

    let providers = ProviderSet::from_config(&config);
    let state = AppState::new(config, providers);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
