//! Extractor collaborator
//!
//! The free-text extraction itself is a black box behind this trait: it takes
//! the canonical payload and returns a structured receipt guess with its own
//! confidence score. The production implementation calls an HTTP service;
//! tests substitute a stub.

use crate::error::IngestError;
use crate::payload::CanonicalPayload;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Structured receipt guess produced by the Extractor
///
/// `confidence` is an integer percentage in `[0, 100]`. The merchant map
/// service may rewrite `category`, `subcategory`, `confidence`, and
/// `explanation` before persistence; all other fields pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub date: NaiveDate,
    pub amount: f64,
    pub currency: String,
    pub merchant: String,
    pub last4: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub notes: Option<String>,
    pub confidence: u8,
    pub explanation: String,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, payload: &CanonicalPayload) -> Result<ReceiptData, IngestError>;
}

/// HTTP-backed Extractor client
pub struct HttpExtractor {
    http_client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    from: &'a str,
    subject: &'a str,
    text: &'a str,
    html: Option<&'a str>,
}

impl HttpExtractor {
    pub fn new(endpoint: String, timeout_ms: u64) -> Result<Self, IngestError> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| {
                IngestError::Configuration(format!("Failed to create extractor client: {}", e))
            })?;
        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn extract(&self, payload: &CanonicalPayload) -> Result<ReceiptData, IngestError> {
        debug!(
            correlation_id = %payload.metadata.correlation_id,
            endpoint = %self.endpoint,
            "Requesting receipt extraction"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&ExtractRequest {
                from: &payload.from,
                subject: &payload.subject,
                text: &payload.text,
                html: payload.html.as_deref(),
            })
            .send()
            .await
            .map_err(|e| IngestError::Extraction(format!("extractor request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| IngestError::Extraction(format!("extractor returned error: {}", e)))?;

        let receipt: ReceiptData = response
            .json()
            .await
            .map_err(|e| IngestError::Extraction(format!("extractor response malformed: {}", e)))?;

        Ok(receipt)
    }
}
