//! SES-style SNS notification adapter
//!
//! Inbound mail arrives wrapped twice: an SNS envelope whose `Message` field
//! is a second, JSON-encoded string carrying the SES mail object. The
//! envelope structure (type, signature fields, signing-certificate URL) is
//! validated before the embedded mail object is trusted.

use crate::config::SesSettings;
use crate::error::IngestError;
use crate::payload::{CanonicalPayload, PayloadMetadata};
use crate::providers::{HealthStatus, ProviderAdapter, RawRequest, SES};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Instant;
use tracing::warn;

#[derive(Debug)]
pub struct SesAdapter {
    verify_signatures: bool,
    timeout_ms: u64,
}

impl SesAdapter {
    pub fn new(settings: &SesSettings) -> Self {
        Self {
            verify_signatures: settings.verify_signatures,
            timeout_ms: settings.timeout_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SnsEnvelope {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "MessageId")]
    message_id: Option<String>,
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Signature")]
    signature: Option<String>,
    #[serde(rename = "SignatureVersion")]
    signature_version: Option<String>,
    #[serde(rename = "SigningCertURL")]
    signing_cert_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SesNotification {
    mail: SesMail,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SesMail {
    #[serde(rename = "messageId")]
    message_id: String,
    source: String,
    destination: Vec<String>,
    timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "commonHeaders")]
    common_headers: Option<CommonHeaders>,
}

#[derive(Debug, Deserialize)]
struct CommonHeaders {
    subject: Option<String>,
}

fn parse_envelope(body: &str) -> Result<SnsEnvelope, IngestError> {
    serde_json::from_str(body).map_err(|e| IngestError::Parsing {
        provider: SES,
        code: "PARSING_FAILED",
        message: format!("SNS envelope is not valid JSON: {}", e),
    })
}

impl ProviderAdapter for SesAdapter {
    fn name(&self) -> &'static str {
        SES
    }

    fn verify(&self, request: &RawRequest) -> Result<(), IngestError> {
        if !self.verify_signatures {
            // Explicit configuration choice for constrained deployments,
            // logged on every request so it can never pass unnoticed.
            warn!(
                correlation_id = %request.correlation_id,
                "SES signature verification disabled by configuration; accepting envelope"
            );
            return Ok(());
        }

        let envelope = parse_envelope(&request.body)?;

        if envelope.kind != "Notification" {
            return Err(IngestError::InvalidSignature {
                provider: SES,
                detail: format!("unexpected envelope type '{}'", envelope.kind),
            });
        }

        match envelope.signature.as_deref() {
            None | Some("") => {
                return Err(IngestError::MissingSignature { provider: SES });
            }
            Some(_) => {}
        }

        if envelope.signature_version.as_deref() != Some("1") {
            return Err(IngestError::InvalidSignature {
                provider: SES,
                detail: "unsupported or missing SignatureVersion".to_string(),
            });
        }

        let cert_url = envelope
            .signing_cert_url
            .as_deref()
            .ok_or(IngestError::MissingSignature { provider: SES })?;
        let parsed = url::Url::parse(cert_url).map_err(|_| IngestError::InvalidSignature {
            provider: SES,
            detail: "signing certificate URL is not a valid URL".to_string(),
        })?;
        let host_ok = parsed
            .host_str()
            .map(|h| h.ends_with(".amazonaws.com"))
            .unwrap_or(false);
        if parsed.scheme() != "https" || !host_ok {
            return Err(IngestError::InvalidSignature {
                provider: SES,
                detail: "signing certificate URL is not an https amazonaws.com endpoint"
                    .to_string(),
            });
        }

        Ok(())
    }

    fn parse(&self, request: &RawRequest) -> Result<CanonicalPayload, IngestError> {
        let envelope = parse_envelope(&request.body)?;

        // The inner message is a second JSON document encoded as a string
        let notification: SesNotification =
            serde_json::from_str(&envelope.message).map_err(|e| IngestError::Parsing {
                provider: SES,
                code: "PARSING_FAILED",
                message: format!("embedded SES message is not valid JSON: {}", e),
            })?;

        let mail = notification.mail;
        let alias = mail
            .destination
            .first()
            .cloned()
            .ok_or(IngestError::Parsing {
                provider: SES,
                code: "PARSING_FAILED",
                message: "destination list empty in SES mail object".to_string(),
            })?;

        let mut extra = serde_json::Map::new();
        if let Some(sns_id) = envelope.message_id {
            extra.insert("sns_message_id".to_string(), sns_id.into());
        }

        Ok(CanonicalPayload {
            alias,
            message_id: mail.message_id,
            from: mail.source,
            to: mail.destination,
            subject: mail
                .common_headers
                .and_then(|h| h.subject)
                .unwrap_or_default(),
            text: notification.content.unwrap_or_default(),
            html: None,
            received_at: mail.timestamp.unwrap_or_else(Utc::now),
            attachments: Vec::new(),
            metadata: PayloadMetadata {
                provider: SES.to_string(),
                correlation_id: request.correlation_id,
                extra,
            },
        })
    }

    fn health_check(&self) -> HealthStatus {
        let started = Instant::now();
        let (healthy, details) = if self.timeout_ms == 0 {
            (false, "timeout must be non-zero".to_string())
        } else if self.verify_signatures {
            (
                true,
                format!("signature verification on, timeout {} ms", self.timeout_ms),
            )
        } else {
            (
                true,
                format!(
                    "signature verification DISABLED by configuration, timeout {} ms",
                    self.timeout_ms
                ),
            )
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
        hasher.update(SES.as_bytes());
        hasher.update([self.verify_signatures as u8]);
        hasher.update(self.timeout_ms.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}
