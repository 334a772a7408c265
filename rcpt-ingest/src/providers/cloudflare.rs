//! Cloudflare-style JSON webhook adapter
//!
//! Verifies an HMAC-SHA256 signature carried in a request header against a
//! per-provider shared secret, then parses the flat webhook payload (top-level
//! addressing fields plus a `content` array of typed parts) into the canonical
//! shape.

use crate::config::CloudflareSettings;
use crate::error::IngestError;
use crate::payload::{Attachment, CanonicalPayload, PayloadMetadata};
use crate::providers::{HealthStatus, ProviderAdapter, RawRequest, CLOUDFLARE};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Instant;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded HMAC-SHA256 of the raw request body
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug)]
pub struct CloudflareAdapter {
    secret: Option<String>,
    timeout_ms: u64,
}

impl CloudflareAdapter {
    pub fn new(settings: &CloudflareSettings) -> Self {
        Self {
            secret: settings.secret.clone(),
            timeout_ms: settings.timeout_ms,
        }
    }

    fn secret(&self) -> Result<&str, IngestError> {
        self.secret.as_deref().ok_or_else(|| {
            IngestError::Configuration("cloudflare webhook secret not configured".to_string())
        })
    }
}

#[derive(Debug, Deserialize)]
struct CloudflareWebhook {
    to: String,
    from: String,
    subject: Option<String>,
    #[serde(rename = "messageId")]
    message_id: Option<String>,
    #[serde(rename = "receivedAt")]
    received_at: Option<DateTime<Utc>>,
    content: Option<Vec<ContentPart>>,
    #[serde(default)]
    attachments: Vec<WebhookAttachment>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct WebhookAttachment {
    filename: Option<String>,
    #[serde(rename = "contentType")]
    content_type: Option<String>,
    #[serde(default)]
    size: i64,
}

impl ProviderAdapter for CloudflareAdapter {
    fn name(&self) -> &'static str {
        CLOUDFLARE
    }

    fn verify(&self, request: &RawRequest) -> Result<(), IngestError> {
        let secret = self.secret()?;

        let header = request
            .header(SIGNATURE_HEADER)
            .ok_or(IngestError::MissingSignature {
                provider: CLOUDFLARE,
            })?;

        // A header that is not valid hex is the same failure class as a
        // missing header, distinct from a well-formed signature that does
        // not match.
        let signature = hex::decode(header.trim()).map_err(|_| IngestError::MissingSignature {
            provider: CLOUDFLARE,
        })?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
            IngestError::Configuration("cloudflare webhook secret is unusable".to_string())
        })?;
        mac.update(request.body.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| IngestError::InvalidSignature {
                provider: CLOUDFLARE,
                detail: "signature mismatch".to_string(),
            })
    }

    fn parse(&self, request: &RawRequest) -> Result<CanonicalPayload, IngestError> {
        let webhook: CloudflareWebhook =
            serde_json::from_str(&request.body).map_err(|e| IngestError::Parsing {
                provider: CLOUDFLARE,
                code: "PARSING_FAILED",
                message: format!("webhook body is not valid JSON: {}", e),
            })?;

        let content = webhook.content.ok_or(IngestError::Parsing {
            provider: CLOUDFLARE,
            code: "PARSING_FAILED",
            message: "content array missing from webhook payload".to_string(),
        })?;

        let message_id = webhook.message_id.ok_or(IngestError::Parsing {
            provider: CLOUDFLARE,
            code: "PARSING_FAILED",
            message: "messageId missing from webhook payload".to_string(),
        })?;

        let text = content
            .iter()
            .find(|p| p.kind.starts_with("text/plain"))
            .map(|p| p.value.clone())
            .unwrap_or_default();
        let html = content
            .iter()
            .find(|p| p.kind.starts_with("text/html"))
            .map(|p| p.value.clone());

        let attachments = webhook
            .attachments
            .into_iter()
            .map(|a| Attachment {
                filename: a.filename.unwrap_or_default(),
                content_type: a.content_type.unwrap_or_default(),
                size_bytes: a.size,
            })
            .collect();

        Ok(CanonicalPayload {
            alias: webhook.to.clone(),
            message_id,
            from: webhook.from,
            to: vec![webhook.to],
            subject: webhook.subject.unwrap_or_default(),
            text,
            html,
            received_at: webhook.received_at.unwrap_or_else(Utc::now),
            attachments,
            metadata: PayloadMetadata {
                provider: CLOUDFLARE.to_string(),
                correlation_id: request.correlation_id,
                extra: serde_json::Map::new(),
            },
        })
    }

    fn health_check(&self) -> HealthStatus {
        let started = Instant::now();
        let (healthy, details) = match (&self.secret, self.timeout_ms) {
            (None, _) => (false, "webhook secret not configured".to_string()),
            (Some(_), 0) => (false, "timeout must be non-zero".to_string()),
            (Some(_), t) => (true, format!("secret configured, timeout {} ms", t)),
        };
        HealthStatus {
            healthy,
            response_time_ms: started.elapsed().as_millis() as u64,
            details,
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    fn config_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(CLOUDFLARE.as_bytes());
        hasher.update(self.secret.as_deref().unwrap_or_default().as_bytes());
        hasher.update(self.timeout_ms.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}
