//! Provider registry
//!
//! An explicit, injectable object (constructed at startup, fresh per test)
//! rather than process-global state. Adapters are cached by provider name
//! *and* configuration fingerprint so a secret rotation never reuses a stale
//! adapter.

use crate::config::ProvidersConfig;
use crate::error::IngestError;
use crate::providers::{
    CloudflareAdapter, HealthStatus, ProviderAdapter, SesAdapter, CLOUDFLARE, PROVIDER_NAMES, SES,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Timestamped health check outcome
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub provider: String,
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    /// True when served from the caching window without re-running the check
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub configured: bool,
    pub is_default: bool,
    pub timeout_ms: u64,
}

pub struct ProviderRegistry {
    config: ProvidersConfig,
    adapters: Mutex<HashMap<(String, String), Arc<dyn ProviderAdapter>>>,
    health_cache: Mutex<HashMap<String, HealthCheckResult>>,
}

impl ProviderRegistry {
    pub fn new(config: ProvidersConfig) -> Self {
        Self {
            config,
            adapters: Mutex::new(HashMap::new()),
            health_cache: Mutex::new(HashMap::new()),
        }
    }

    fn unknown_provider(name: &str) -> IngestError {
        IngestError::Configuration(format!(
            "Unknown provider '{}'. Valid providers: {:?}",
            name, PROVIDER_NAMES
        ))
    }

    fn build(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>, IngestError> {
        match name {
            CLOUDFLARE => Ok(Arc::new(CloudflareAdapter::new(&self.config.cloudflare))),
            SES => Ok(Arc::new(SesAdapter::new(&self.config.ses))),
            other => Err(Self::unknown_provider(other)),
        }
    }

    /// Get (or construct and cache) the adapter for a provider name
    pub fn adapter(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>, IngestError> {
        let fresh = self.build(name)?;
        let key = (name.to_string(), fresh.config_fingerprint());

        let mut adapters = self
            .adapters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let adapter = adapters.entry(key).or_insert(fresh);
        Ok(Arc::clone(adapter))
    }

    pub fn default_provider(&self) -> &str {
        &self.config.default_provider
    }

    /// Fixed 1:1 fallback pairing between the two providers. A third
    /// provider forces a decision at this match.
    pub fn fallback_provider(&self, name: &str) -> Result<&'static str, IngestError> {
        match name {
            CLOUDFLARE => Ok(SES),
            SES => Ok(CLOUDFLARE),
            other => Err(Self::unknown_provider(other)),
        }
    }

    /// Run (or serve from cache) a provider health check
    ///
    /// Repeated calls within the caching window return the same timestamp;
    /// bypassing the cache always produces a strictly later one.
    pub fn perform_health_check(
        &self,
        name: &str,
        use_cache: bool,
    ) -> Result<HealthCheckResult, IngestError> {
        let adapter = self.adapter(name)?;
        let window = Duration::seconds(self.config.health_cache_secs as i64);

        let mut cache = self
            .health_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if use_cache {
            if let Some(previous) = cache.get(name) {
                if Utc::now() - previous.checked_at < window {
                    let mut cached = previous.clone();
                    cached.cached = true;
                    return Ok(cached);
                }
            }
        }

        let status = adapter.health_check();
        let mut checked_at = Utc::now();
        if let Some(previous) = cache.get(name) {
            // Clock granularity must never make a fresh check look cached
            if checked_at <= previous.checked_at {
                checked_at = previous.checked_at + Duration::microseconds(1);
            }
        }

        let result = HealthCheckResult {
            provider: name.to_string(),
            status,
            checked_at,
            cached: false,
        };
        cache.insert(name.to_string(), result.clone());
        Ok(result)
    }

    /// Report every known provider: configured or not, default or not, and
    /// its timeout
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        PROVIDER_NAMES
            .iter()
            .map(|&name| {
                let configured = match name {
                    CLOUDFLARE => self.config.cloudflare.secret.is_some(),
                    _ => true,
                };
                let timeout_ms = match name {
                    CLOUDFLARE => self.config.cloudflare.timeout_ms,
                    _ => self.config.ses.timeout_ms,
                };
                ProviderInfo {
                    name,
                    configured,
                    is_default: name == self.config.default_provider,
                    timeout_ms,
                }
            })
            .collect()
    }

    /// Drop all cached adapters and health results (test lifecycle)
    pub fn clear(&self) {
        self.adapters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.health_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
