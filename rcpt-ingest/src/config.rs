//! Configuration resolution for rcpt-ingest
//!
//! Settings resolve ENV → TOML → compiled default. Provider secrets are only
//! required when the corresponding adapter is used; a missing secret is
//! reported by the adapter's health check and surfaces as a configuration
//! error at verification time.

use crate::error::IngestError;
use rcpt_common::config::{load_toml_file, resolve_string, toml_str};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_ADAPTER_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;
pub const DEFAULT_HEALTH_CACHE_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub rate_limit_per_minute: u32,
    pub providers: ProvidersConfig,
    pub extractor: ExtractorSettings,
}

#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub default_provider: String,
    pub cloudflare: CloudflareSettings,
    pub ses: SesSettings,
    /// Window during which repeated health checks return the cached result
    pub health_cache_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CloudflareSettings {
    /// Shared secret for HMAC signature verification
    pub secret: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SesSettings {
    /// When false, `verify` accepts every envelope without inspecting
    /// signatures. This is an explicit, logged configuration choice for
    /// constrained deployments, never a silent fallback.
    pub verify_signatures: bool,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl IngestConfig {
    /// Resolve configuration from an optional TOML file plus environment
    /// overrides
    pub fn resolve(config_path: Option<&Path>) -> Result<Self, IngestError> {
        let toml = match config_path {
            Some(path) => load_toml_file(path)?,
            None => None,
        };
        let toml = toml.as_ref();

        let port = resolve_string("listen port", "RCPT_PORT", toml_str(toml, &["port"]))
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|e| IngestError::Configuration(format!("Invalid port: {}", e)))?
            .unwrap_or(DEFAULT_PORT);

        let database_path = resolve_string(
            "database path",
            "RCPT_DATABASE",
            toml_str(toml, &["database"]),
        )
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./rcpt_data/rcpt.db"));

        let rate_limit_per_minute = resolve_string(
            "rate limit",
            "RCPT_RATE_LIMIT_PER_MINUTE",
            toml_str(toml, &["rate_limit_per_minute"]),
        )
        .map(|v| v.parse::<u32>())
        .transpose()
        .map_err(|e| IngestError::Configuration(format!("Invalid rate limit: {}", e)))?
        .unwrap_or(DEFAULT_RATE_LIMIT_PER_MINUTE);

        let default_provider = resolve_string(
            "default provider",
            "RCPT_DEFAULT_PROVIDER",
            toml_str(toml, &["providers", "default"]),
        )
        .unwrap_or_else(|| crate::providers::CLOUDFLARE.to_string());

        if !crate::providers::PROVIDER_NAMES.contains(&default_provider.as_str()) {
            return Err(IngestError::Configuration(format!(
                "Unknown default provider '{}'. Valid providers: {:?}",
                default_provider,
                crate::providers::PROVIDER_NAMES
            )));
        }

        let cloudflare = CloudflareSettings {
            secret: resolve_string(
                "cloudflare webhook secret",
                "RCPT_CLOUDFLARE_SECRET",
                toml_str(toml, &["providers", "cloudflare", "secret"]),
            ),
            timeout_ms: resolve_timeout(
                "RCPT_CLOUDFLARE_TIMEOUT_MS",
                toml_str(toml, &["providers", "cloudflare", "timeout_ms"]),
            )?,
        };

        let verify_signatures = resolve_string(
            "ses signature verification",
            "RCPT_SES_VERIFY_SIGNATURES",
            toml_str(toml, &["providers", "ses", "verify_signatures"]),
        )
        .map(|v| v.parse::<bool>())
        .transpose()
        .map_err(|e| {
            IngestError::Configuration(format!("Invalid ses.verify_signatures: {}", e))
        })?
        .unwrap_or(true);

        if !verify_signatures {
            warn!(
                "SES signature verification is DISABLED by configuration; \
                 inbound SNS envelopes will be accepted without inspection"
            );
        }

        let ses = SesSettings {
            verify_signatures,
            timeout_ms: resolve_timeout(
                "RCPT_SES_TIMEOUT_MS",
                toml_str(toml, &["providers", "ses", "timeout_ms"]),
            )?,
        };

        let extractor = ExtractorSettings {
            endpoint: resolve_string(
                "extractor endpoint",
                "RCPT_EXTRACTOR_ENDPOINT",
                toml_str(toml, &["extractor", "endpoint"]),
            )
            .unwrap_or_else(|| "http://127.0.0.1:5781/extract".to_string()),
            timeout_ms: resolve_timeout(
                "RCPT_EXTRACTOR_TIMEOUT_MS",
                toml_str(toml, &["extractor", "timeout_ms"]),
            )?,
        };

        Ok(Self {
            port,
            database_path,
            rate_limit_per_minute,
            providers: ProvidersConfig {
                default_provider,
                cloudflare,
                ses,
                health_cache_secs: DEFAULT_HEALTH_CACHE_SECS,
            },
            extractor,
        })
    }
}

fn resolve_timeout(env_var: &str, toml_value: Option<String>) -> Result<u64, IngestError> {
    resolve_string("timeout", env_var, toml_value)
        .map(|v| v.parse::<u64>())
        .transpose()
        .map_err(|e| IngestError::Configuration(format!("Invalid timeout: {}", e)))
        .map(|v| v.unwrap_or(DEFAULT_ADAPTER_TIMEOUT_MS))
}
