//! Wortschatz - a relay that enriches German words using a generative language API
//!
//! A single endpoint takes a word or phrase, asks the upstream model for a spelling
//! correction, an English translation and three example sentences, and returns the model's
//! reply only once it has been normalized into a strict schema.

use axum::Router;
use axum::routing::post;
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

pub mod client;
pub mod errors;
pub mod gemini;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod prompt;

use client::{HttpClient, HyperClient};
use gemini::UpstreamConfig;
use handlers::{enrich_handler, method_not_allowed};

/// The route serving enrichment requests.
pub const ENRICH_PATH: &str = "/api/enrich";

/// The application state: the HTTP client and the upstream configuration
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub upstream: Arc<UpstreamConfig>,
}

impl AppState<HyperClient> {
    /// Create a new AppState backed by a pooled Hyper client
    pub fn new(
        upstream: UpstreamConfig,
        pool_idle_timeout: Duration,
        pool_max_idle_per_host: usize,
    ) -> Self {
        let http_client = client::create_hyper_client(pool_idle_timeout, pool_max_idle_per_host);
        Self::with_client(upstream, http_client)
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(upstream: UpstreamConfig, http_client: T) -> Self {
        Self {
            http_client,
            upstream: Arc::new(upstream),
        }
    }
}

/// Build the main router for the relay
///
/// `POST /api/enrich` is the only route. Other methods on it get a JSON 405 rather than
/// axum's empty default.
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route(
            ENRICH_PATH,
            post(enrich_handler::<T>).fallback(method_not_allowed),
        )
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection.
///
/// `prefix` is prepended to every metric name; it must live for the whole program, hence
/// the `'static` bound on the `Cow`.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}
