//! Error types for rcpt-ingest
//!
//! One taxonomy for the whole service: adapters, registry, pipeline, and API
//! handlers all speak `IngestError`. Provider-facing responses carry a
//! machine-readable code and the request correlation id, never stack traces
//! or secrets.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Signature header absent or not decodable. Distinct from a signature
    /// that is present but does not match.
    #[error("Signature header missing or malformed for provider {provider}")]
    MissingSignature { provider: &'static str },

    /// Signature present but failed verification
    #[error("Signature verification failed for provider {provider}: {detail}")]
    InvalidSignature {
        provider: &'static str,
        detail: String,
    },

    /// Malformed provider payload, always tagged with the provider name and a
    /// machine-readable code
    #[error("Payload parsing failed for provider {provider} [{code}]: {message}")]
    Parsing {
        provider: &'static str,
        code: &'static str,
        message: String,
    },

    /// Unknown provider, missing secret, invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown or inactive recipient alias. Indistinguishable from "not our
    /// traffic" and therefore never processed.
    #[error("Unknown or inactive recipient alias: {0}")]
    TenantResolution(String),

    /// Recoverable by the caller retrying later
    #[error("Rate limit exceeded for organization {0}")]
    RateLimited(Uuid),

    /// The Extractor collaborator failed. Recorded on the provider log, not
    /// surfaced as a hard HTTP error.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Verification/parsing exceeded the adapter's bounded window
    #[error("Provider {provider} exceeded its {timeout_ms} ms processing window")]
    Timeout {
        provider: &'static str,
        timeout_ms: u64,
    },

    /// Requested entity not found within the caller's organization scope
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Common error: {0}")]
    Common(#[from] rcpt_common::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IngestError {
    /// Machine-readable error code included in every non-2xx response body
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::MissingSignature { .. } => "MISSING_SIGNATURE",
            IngestError::InvalidSignature { .. } => "INVALID_SIGNATURE",
            IngestError::Parsing { code, .. } => *code,
            IngestError::Configuration(_) => "CONFIGURATION_ERROR",
            IngestError::TenantResolution(_) => "UNKNOWN_ALIAS",
            IngestError::RateLimited(_) => "RATE_LIMITED",
            IngestError::Extraction(_) => "EXTRACTION_FAILED",
            IngestError::Timeout { .. } => "PROVIDER_TIMEOUT",
            IngestError::NotFound(_) => "NOT_FOUND",
            IngestError::BadRequest(_) => "BAD_REQUEST",
            IngestError::Serialization(_) => "INTERNAL_ERROR",
            IngestError::Common(_) => "INTERNAL_ERROR",
            IngestError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::MissingSignature { .. } | IngestError::InvalidSignature { .. } => {
                StatusCode::UNAUTHORIZED
            }
            IngestError::Parsing { .. } | IngestError::BadRequest(_) => StatusCode::BAD_REQUEST,
            IngestError::TenantResolution(_) | IngestError::NotFound(_) => StatusCode::NOT_FOUND,
            IngestError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            IngestError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            IngestError::Extraction(_) => StatusCode::BAD_GATEWAY,
            IngestError::Configuration(_)
            | IngestError::Serialization(_)
            | IngestError::Common(_)
            | IngestError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the provider-facing response, tagged with the request's
    /// correlation id
    pub fn into_response_with(self, correlation_id: Uuid) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            },
            "correlation_id": correlation_id,
        }));
        (status, body).into_response()
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4();
        self.into_response_with(correlation_id)
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, IngestError>;
