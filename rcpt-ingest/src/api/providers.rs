//! Provider listing and health endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::providers::{HealthCheckResult, ProviderInfo};
use crate::AppState;

/// GET /api/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    Json(state.registry.list_providers())
}

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    /// `?fresh=true` bypasses the health cache
    #[serde(default)]
    pub fresh: bool,
}

/// GET /api/providers/{name}/health
pub async fn provider_health(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HealthQuery>,
) -> ApiResult<Json<HealthCheckResult>> {
    let result = state.registry.perform_health_check(&name, !query.fresh)?;
    Ok(Json(result))
}
