//! Inbound webhook handlers
//!
//! `POST /inbound` routes to the configured default provider;
//! `POST /inbound/{provider}` names one explicitly. Both acknowledge
//! duplicates and extraction failures with 2xx so providers stop retrying;
//! only verification, parsing, tenant, and rate failures produce errors.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::pipeline::IngestOutcome;
use crate::providers::RawRequest;
use crate::AppState;

/// POST /inbound
pub async fn inbound_default(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let provider = state.registry.default_provider().to_string();
    handle_inbound(state, &provider, headers, body).await
}

/// POST /inbound/{provider}
pub async fn inbound_with_provider(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    handle_inbound(state, &provider, headers, body).await
}

async fn handle_inbound(
    state: AppState,
    provider: &str,
    headers: HeaderMap,
    body: String,
) -> Response {
    let raw = RawRequest::from_parts(&headers, body);
    let correlation_id = raw.correlation_id;

    match state.pipeline.process(provider, raw).await {
        Ok(IngestOutcome::Stored {
            transaction_id,
            correlation_id,
        }) => Json(json!({
            "status": "stored",
            "transaction_id": transaction_id,
            "correlation_id": correlation_id,
        }))
        .into_response(),

        Ok(IngestOutcome::Duplicate {
            transaction_id,
            correlation_id,
        }) => Json(json!({
            "status": "duplicate",
            "message": "message already processed",
            "transaction_id": transaction_id,
            "correlation_id": correlation_id,
        }))
        .into_response(),

        Ok(IngestOutcome::ExtractionFailed { correlation_id }) => Json(json!({
            "status": "received",
            "extracted": false,
            "correlation_id": correlation_id,
        }))
        .into_response(),

        Err(e) => {
            info!(
                correlation_id = %correlation_id,
                provider = provider,
                code = e.code(),
                "Inbound request rejected"
            );
            e.into_response_with(correlation_id)
        }
    }
}
