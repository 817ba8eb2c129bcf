mod config;

use clap::Parser as _;
use config::Config;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};
use wortschatz::{AppState, build_metrics_layer_and_handle, build_metrics_router, build_router};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    info!("Starting enrichment relay with config: {:?}", config);

    let upstream = config.upstream();
    if upstream.api_key().is_none() {
        warn!("GEMINI_API_KEY is not set, enrichment requests will fail until it is configured");
    }

    let app_state = AppState::new(
        upstream,
        Duration::from_secs(config.pool_idle_timeout_secs),
        config.pool_max_idle_per_host,
    );
    let mut router = build_router(app_state);

    if config.metrics {
        let (prometheus_layer, handle) = build_metrics_layer_and_handle(config.metrics_prefix);
        router = router.layer(prometheus_layer);

        let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
        let metrics_listener = TcpListener::bind(&metrics_addr).await?;
        info!("Metrics endpoint listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, build_metrics_router(handle)).await {
                tracing::error!("Metrics server stopped: {}", e);
            }
        });
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Enrichment relay listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
