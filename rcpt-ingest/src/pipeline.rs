//! Ingestion pipeline
//!
//! The ordered sequence every inbound webhook goes through: verify, parse,
//! resolve tenant, rate-check, claim the idempotency ledger, extract, fuse
//! with learned mappings, store. Stages run strictly in this order; a failure
//! at any stage stops the run, except extraction failure which is recorded on
//! the ledger and acknowledged so the provider does not retry.

use crate::db::{aliases, provider_log, transactions};
use crate::db::provider_log::LedgerClaim;
use crate::error::IngestError;
use crate::extractor::Extractor;
use crate::merchant_map::MerchantMapService;
use crate::providers::{ProviderRegistry, RawRequest};
use crate::rate_limit::OrgRateLimiter;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Terminal state of a successful pipeline run
#[derive(Debug)]
pub enum IngestOutcome {
    /// Newly processed and persisted
    Stored {
        transaction_id: String,
        correlation_id: Uuid,
    },
    /// The ledger already held this `(org, message_id)`; nothing re-ran.
    ///
    /// `transaction_id` is `None` when the original delivery is still in
    /// flight (its ledger row is claimed but not yet finalized) or when the
    /// original attempt failed extraction. Either way the duplicate is
    /// acknowledged without reprocessing.
    Duplicate {
        transaction_id: Option<String>,
        correlation_id: Uuid,
    },
    /// The ledger row records the failure; the webhook is still acknowledged
    ExtractionFailed { correlation_id: Uuid },
}

pub struct IngestionPipeline {
    db: SqlitePool,
    registry: Arc<ProviderRegistry>,
    rate_limiter: Arc<OrgRateLimiter>,
    extractor: Arc<dyn Extractor>,
    merchant_map: MerchantMapService,
}

impl IngestionPipeline {
    pub fn new(
        db: SqlitePool,
        registry: Arc<ProviderRegistry>,
        rate_limiter: Arc<OrgRateLimiter>,
        extractor: Arc<dyn Extractor>,
        merchant_map: MerchantMapService,
    ) -> Self {
        Self {
            db,
            registry,
            rate_limiter,
            extractor,
            merchant_map,
        }
    }

    /// Run one inbound request through every stage
    pub async fn process(
        &self,
        provider_name: &str,
        raw: RawRequest,
    ) -> Result<IngestOutcome, IngestError> {
        let correlation_id = raw.correlation_id;
        let started = Instant::now();

        info!(
            correlation_id = %correlation_id,
            provider = provider_name,
            body_bytes = raw.body.len(),
            "Inbound request received"
        );

        let adapter = self.registry.adapter(provider_name)?;

        adapter.verify(&raw)?;
        debug!(correlation_id = %correlation_id, provider = provider_name, "Signature verified");

        let payload = adapter.parse(&raw)?;
        debug!(
            correlation_id = %correlation_id,
            provider = provider_name,
            message_id = %payload.message_id,
            alias = %payload.alias,
            "Payload parsed"
        );

        // Enforced after verification and parsing complete: a slow adapter
        // is reported as a timeout, not interrupted mid-stage.
        if started.elapsed() > Duration::from_millis(adapter.timeout_ms()) {
            return Err(IngestError::Timeout {
                provider: adapter.name(),
                timeout_ms: adapter.timeout_ms(),
            });
        }

        let alias_row = aliases::resolve(&self.db, &payload.alias)
            .await?
            .filter(|row| row.is_active)
            .ok_or_else(|| IngestError::TenantResolution(payload.alias.clone()))?;
        let org_id: Uuid = alias_row.org_id.parse().map_err(|_| {
            IngestError::Common(rcpt_common::Error::Internal(format!(
                "alias '{}' carries a malformed org id",
                payload.alias
            )))
        })?;
        debug!(correlation_id = %correlation_id, org_id = %org_id, "Tenant resolved");

        self.rate_limiter.check(org_id)?;

        let payload_json = serde_json::to_string(&payload)?;
        let claim = provider_log::claim(
            &self.db,
            org_id,
            adapter.name(),
            &payload.message_id,
            &payload_json,
            correlation_id,
        )
        .await?;

        let log_id = match claim {
            LedgerClaim::Duplicate { entry } => {
                info!(
                    correlation_id = %correlation_id,
                    org_id = %org_id,
                    message_id = %payload.message_id,
                    original_correlation_id = %entry.correlation_id,
                    "Duplicate delivery; returning original outcome"
                );
                return Ok(IngestOutcome::Duplicate {
                    transaction_id: entry.transaction_id,
                    correlation_id,
                });
            }
            LedgerClaim::Claimed { log_id } => log_id,
        };

        let receipt = match self.extractor.extract(&payload).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    org_id = %org_id,
                    message_id = %payload.message_id,
                    error = %e,
                    "Extraction failed; recording on ledger"
                );
                provider_log::finalize(
                    &self.db,
                    &log_id,
                    false,
                    false,
                    Some(&e.to_string()),
                    None,
                    started.elapsed().as_millis() as i64,
                )
                .await?;
                return Ok(IngestOutcome::ExtractionFailed { correlation_id });
            }
        };
        debug!(
            correlation_id = %correlation_id,
            merchant = %receipt.merchant,
            confidence = receipt.confidence,
            "Receipt extracted"
        );

        let fused = self.merchant_map.apply_mapping(receipt, org_id).await?;

        let transaction_id =
            transactions::insert(&self.db, org_id, &payload.message_id, &fused).await?;
        provider_log::finalize(
            &self.db,
            &log_id,
            true,
            true,
            None,
            Some(&transaction_id),
            started.elapsed().as_millis() as i64,
        )
        .await?;

        info!(
            correlation_id = %correlation_id,
            org_id = %org_id,
            transaction_id = %transaction_id,
            merchant = %fused.merchant,
            confidence = fused.confidence,
            processing_time_ms = started.elapsed().as_millis() as u64,
            "Transaction stored"
        );

        Ok(IngestOutcome::Stored {
            transaction_id,
            correlation_id,
        })
    }
}
