//! Merchant map service
//!
//! The system's only durable "memory": user-corrected merchant→category
//! associations, one row per `(org, normalized merchant)`. Fresh extractor
//! output is fused with the learned mapping before persistence.

use crate::error::IngestError;
use crate::extractor::ReceiptData;
use chrono::{Duration, Utc};
use rcpt_common::db::models::MerchantMapping;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// Fixed confidence bonus applied when a learned mapping matches.
///
/// The fused confidence is monotonic: never decreased, and never above
/// [`CONFIDENCE_CEILING`] even when the original confidence plus the bonus
/// would exceed it. Changing this value is a behavior change; the invariant
/// is property-tested across the full confidence range.
pub const MAPPING_CONFIDENCE_BONUS: u8 = 15;

/// Upper bound for fused confidence
pub const CONFIDENCE_CEILING: u8 = 100;

/// Normalize a merchant name for mapping storage and lookup
///
/// Case-folds, trims, collapses internal whitespace, and strips trailing
/// corporate suffixes so variant spellings of the same merchant converge to
/// one row. Applied identically on write and on read.
pub fn normalize_merchant(name: &str) -> String {
    const SUFFIXES: &[&str] = &[
        "inc",
        "incorporated",
        "corp",
        "corporation",
        "company",
        "co",
        "llc",
        "ltd",
        "limited",
        "gmbh",
        "plc",
    ];

    let lowered = name.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();

    while let Some(last) = tokens.last() {
        let bare = last.trim_end_matches(['.', ',']);
        if tokens.len() > 1 && SUFFIXES.contains(&bare) {
            tokens.pop();
        } else {
            break;
        }
    }

    tokens
        .join(" ")
        .trim_end_matches(['.', ','])
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingStats {
    pub total_mappings: i64,
    /// Mappings created within the last 30 days
    pub recent_mappings: i64,
    /// Ordered by descending mapping count
    pub top_categories: Vec<CategoryCount>,
}

#[derive(Clone)]
pub struct MerchantMapService {
    db: SqlitePool,
}

impl MerchantMapService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Find the learned mapping for a merchant, if any. Pure read.
    pub async fn lookup(
        &self,
        org_id: Uuid,
        merchant: &str,
    ) -> Result<Option<MerchantMapping>, IngestError> {
        let normalized = normalize_merchant(merchant);
        if normalized.is_empty() {
            return Ok(None);
        }

        let mapping = sqlx::query_as::<_, MerchantMapping>(
            r#"
            SELECT id, org_id, merchant_normalized, category, subcategory,
                   created_by, created_at, updated_at
            FROM merchant_mappings
            WHERE org_id = ? AND merchant_normalized = ?
            "#,
        )
        .bind(org_id.to_string())
        .bind(&normalized)
        .fetch_optional(&self.db)
        .await?;
        Ok(mapping)
    }

    /// Create or overwrite the mapping for a merchant
    ///
    /// A second call for the same `(org, merchant)` overwrites category and
    /// subcategory and bumps `updated_at`; it never creates a second row.
    /// Concurrent updates converge at the storage layer via the unique key,
    /// never by read-modify-write here.
    pub async fn update(
        &self,
        org_id: Uuid,
        merchant: &str,
        category: &str,
        subcategory: Option<&str>,
        user_id: Uuid,
    ) -> Result<MerchantMapping, IngestError> {
        let normalized = normalize_merchant(merchant);
        if normalized.is_empty() {
            return Err(IngestError::BadRequest(
                "merchant name is empty after normalization".to_string(),
            ));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO merchant_mappings
                (id, org_id, merchant_normalized, category, subcategory,
                 created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(org_id, merchant_normalized) DO UPDATE SET
                category = excluded.category,
                subcategory = excluded.subcategory,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(org_id.to_string())
        .bind(&normalized)
        .bind(category)
        .bind(subcategory)
        .bind(user_id.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        debug!(
            org_id = %org_id,
            merchant = %normalized,
            category = %category,
            "Merchant mapping upserted"
        );

        self.lookup(org_id, &normalized).await?.ok_or_else(|| {
            IngestError::Common(rcpt_common::Error::Internal(
                "merchant mapping vanished after upsert".to_string(),
            ))
        })
    }

    /// Fuse a learned mapping into freshly extracted receipt data
    ///
    /// Identity operation (input returned unchanged, explanation verbatim)
    /// when the merchant is empty or unmapped. Otherwise category and
    /// subcategory are overwritten, confidence gains the fixed bonus capped
    /// at the ceiling, and an explanation segment is appended; the model's
    /// original reasoning is preserved so the audit trail shows both.
    pub async fn apply_mapping(
        &self,
        receipt: ReceiptData,
        org_id: Uuid,
    ) -> Result<ReceiptData, IngestError> {
        if receipt.merchant.trim().is_empty() {
            return Ok(receipt);
        }
        match self.lookup(org_id, &receipt.merchant).await? {
            None => Ok(receipt),
            Some(mapping) => Ok(fuse(receipt, &mapping)),
        }
    }

    /// Aggregate mapping statistics for operational visibility
    pub async fn stats(&self, org_id: Uuid) -> Result<MappingStats, IngestError> {
        let org = org_id.to_string();

        let total_mappings: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM merchant_mappings WHERE org_id = ?")
                .bind(&org)
                .fetch_one(&self.db)
                .await?;

        let cutoff = Utc::now() - Duration::days(30);
        let recent_mappings: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM merchant_mappings WHERE org_id = ? AND created_at >= ?",
        )
        .bind(&org)
        .bind(cutoff)
        .fetch_one(&self.db)
        .await?;

        let top_categories = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT category, COUNT(*) as cnt
            FROM merchant_mappings
            WHERE org_id = ?
            GROUP BY category
            ORDER BY cnt DESC
            LIMIT 5
            "#,
        )
        .bind(&org)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();

        Ok(MappingStats {
            total_mappings,
            recent_mappings,
            top_categories,
        })
    }
}

/// The confidence-fusion step, separated from I/O so the invariants are
/// testable in isolation
fn fuse(mut receipt: ReceiptData, mapping: &MerchantMapping) -> ReceiptData {
    let original_category = receipt.category.clone();
    let original_subcategory = receipt.subcategory.clone();

    receipt.category = mapping.category.clone();
    receipt.subcategory = mapping.subcategory.clone();
    receipt.confidence = receipt
        .confidence
        .saturating_add(MAPPING_CONFIDENCE_BONUS)
        .min(CONFIDENCE_CEILING);

    let suggested = match original_subcategory {
        Some(sub) => format!("{} / {}", original_category, sub),
        None => original_category,
    };
    let corrected = match &mapping.subcategory {
        Some(sub) => format!("{} / {}", mapping.category, sub),
        None => mapping.category.clone(),
    };
    receipt.explanation = format!(
        "{} | Applied learned categorization from previous user correction: \
         AI suggested '{}', user-corrected to '{}'",
        receipt.explanation, suggested, corrected
    );

    receipt
}
