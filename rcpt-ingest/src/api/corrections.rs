//! Category correction endpoint
//!
//! A correction does two things atomically from the caller's point of view:
//! fixes the named transaction, and records a merchant mapping so future
//! receipts from the same merchant are categorized the corrected way.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::transactions;
use crate::error::{ApiResult, IngestError};
use crate::AppState;
use rcpt_common::db::models::{MerchantMapping, TransactionRecord};

#[derive(Debug, Deserialize)]
pub struct CategoryCorrection {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub category: String,
    pub subcategory: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CorrectionResponse {
    pub transaction: TransactionRecord,
    pub mapping: MerchantMapping,
}

/// PUT /api/transactions/{id}/category
pub async fn correct_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(correction): Json<CategoryCorrection>,
) -> ApiResult<Json<CorrectionResponse>> {
    let transaction = transactions::update_category(
        &state.db,
        correction.org_id,
        &id,
        &correction.category,
        correction.subcategory.as_deref(),
    )
    .await?
    .ok_or_else(|| IngestError::NotFound(format!("transaction {}", id)))?;

    let mapping = state
        .merchant_map
        .update(
            correction.org_id,
            &transaction.merchant,
            &correction.category,
            correction.subcategory.as_deref(),
            correction.user_id,
        )
        .await?;

    info!(
        org_id = %correction.org_id,
        transaction_id = %id,
        merchant = %mapping.merchant_normalized,
        category = %correction.category,
        "Category corrected and mapping learned"
    );

    Ok(Json(CorrectionResponse {
        transaction,
        mapping,
    }))
}
