//! Transaction read endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::transactions;
use crate::error::{ApiResult, IngestError};
use crate::merchant_map::MappingStats;
use crate::AppState;
use rcpt_common::db::models::TransactionRecord;

#[derive(Debug, Deserialize)]
pub struct OrgQuery {
    pub org_id: Uuid,
}

/// GET /api/transactions/{id}?org_id=...
///
/// Scoped to the caller's organization: a transaction owned by another org
/// returns the same 404 as one that does not exist.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OrgQuery>,
) -> ApiResult<Json<TransactionRecord>> {
    let record = transactions::get(&state.db, query.org_id, &id)
        .await?
        .ok_or_else(|| IngestError::NotFound(format!("transaction {}", id)))?;
    Ok(Json(record))
}

/// GET /api/mappings/stats?org_id=...
pub async fn mapping_stats(
    State(state): State<AppState>,
    Query(query): Query<OrgQuery>,
) -> ApiResult<Json<MappingStats>> {
    let stats = state.merchant_map.stats(query.org_id).await?;
    Ok(Json(stats))
}
