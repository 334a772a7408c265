//! rcpt-ingest library - Receipt Email Ingestion module
//!
//! Receives receipt emails forwarded by inbound mail providers, verifies and
//! parses them per provider, deduplicates per organization, extracts
//! structured transaction data, and fuses it with learned merchant mappings
//! before storing.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod merchant_map;
pub mod payload;
pub mod pipeline;
pub mod providers;
pub mod rate_limit;

use merchant_map::MerchantMapService;
use pipeline::IngestionPipeline;
use providers::ProviderRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Provider adapter registry
    pub registry: Arc<ProviderRegistry>,
    /// Full ingestion pipeline
    pub pipeline: Arc<IngestionPipeline>,
    /// Merchant mapping service (shared with the pipeline)
    pub merchant_map: MerchantMapService,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        registry: Arc<ProviderRegistry>,
        pipeline: Arc<IngestionPipeline>,
        merchant_map: MerchantMapService,
    ) -> Self {
        Self {
            db,
            registry,
            pipeline,
            merchant_map,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    Router::new()
        .route("/inbound", post(api::inbound_default))
        .route("/inbound/:provider", post(api::inbound_with_provider))
        .route("/api/providers", get(api::list_providers))
        .route("/api/providers/:name/health", get(api::provider_health))
        .route("/api/transactions/:id", get(api::get_transaction))
        .route("/api/transactions/:id/category", put(api::correct_category))
        .route("/api/mappings/stats", get(api::mapping_stats))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
