//! Canonical email payload
//!
//! The provider-independent representation every adapter must produce.
//! Data-only contract between the adapters and the pipeline; immutable once
//! an adapter has produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalized inbound email, independent of the delivering provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalPayload {
    /// Recipient address used to resolve tenancy
    pub alias: String,
    /// Provider-supplied id, stable across webhook retries
    pub message_id: String,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
    pub received_at: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
    pub metadata: PayloadMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadMetadata {
    /// Stable adapter identifier ("cloudflare", "ses")
    pub provider: String,
    /// Carried through every pipeline stage so a single message's journey is
    /// traceable end to end
    pub correlation_id: Uuid,
    /// Provider-specific extras (envelope ids, header dumps), never required
    /// downstream
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
