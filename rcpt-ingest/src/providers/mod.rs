//! Inbound mail provider adapters
//!
//! Provider payload shapes are structurally incompatible (flat JSON array of
//! content parts vs. a nested SNS envelope containing a second JSON-encoded
//! string), so each provider owns its own verification and parsing behind one
//! contract. The set of providers is closed; the registry knows both members.

pub mod cloudflare;
pub mod registry;
pub mod ses;

pub use cloudflare::CloudflareAdapter;
pub use registry::{HealthCheckResult, ProviderInfo, ProviderRegistry};
pub use ses::SesAdapter;

use crate::error::IngestError;
use crate::payload::CanonicalPayload;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub const CLOUDFLARE: &str = "cloudflare";
pub const SES: &str = "ses";

/// The closed set of known providers
pub const PROVIDER_NAMES: [&str; 2] = [CLOUDFLARE, SES];

/// Raw inbound HTTP request as seen by an adapter
///
/// Header names are lowercased on construction. The correlation id is minted
/// when the request enters the service and carried into the canonical
/// payload's metadata by whichever adapter parses it.
#[derive(Debug, Clone)]
pub struct RawRequest {
    headers: HashMap<String, String>,
    pub body: String,
    pub correlation_id: Uuid,
}

impl RawRequest {
    pub fn new(body: String) -> Self {
        Self {
            headers: HashMap::new(),
            body,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn from_parts(headers: &axum::http::HeaderMap, body: String) -> Self {
        let mut map = HashMap::new();
        for (name, value) in headers {
            if let Ok(v) = value.to_str() {
                map.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }
        Self {
            headers: map,
            body,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }
}

/// Cheap self-test result used for liveness reporting
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub response_time_ms: u64,
    pub details: String,
}

/// Contract implemented per provider variant
pub trait ProviderAdapter: std::fmt::Debug + Send + Sync {
    /// Stable identifier ("cloudflare", "ses")
    fn name(&self) -> &'static str;

    /// Authenticate the request. Verification is CPU-bound and does not
    /// suspend.
    fn verify(&self, request: &RawRequest) -> Result<(), IngestError>;

    /// Map the provider-specific structure into the canonical shape. Fails
    /// loudly when required structure is absent; never silently defaults
    /// fields.
    fn parse(&self, request: &RawRequest) -> Result<CanonicalPayload, IngestError>;

    /// Cheap self-test (secret configured, timeout valid), not a round-trip
    /// to the provider. Never panics and never returns an error: a broken
    /// provider reports `healthy: false`.
    fn health_check(&self) -> HealthStatus;

    /// Bounded window for verification + parsing
    fn timeout_ms(&self) -> u64;

    /// Configuration fingerprint for registry caching. Two adapters
    /// constructed with different secrets are never interchangeable.
    fn config_fingerprint(&self) -> String;
}
