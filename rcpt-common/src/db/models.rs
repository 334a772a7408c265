//! Row models for organization-scoped entities
//!
//! Every row written by the ingestion core carries an `org_id`; the repository
//! layer scopes all reads and writes by it so cross-tenant access is
//! structurally impossible, not merely policy-denied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Maps an inbound address to exactly one organization
///
/// Read-only from the pipeline's perspective; `is_active` gates acceptance.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganizationAlias {
    pub alias: String,
    pub org_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One row per ingestion attempt
///
/// The unique `(org_id, message_id)` pair is the idempotency ledger: it is
/// what prevents duplicate processing under concurrent webhook redelivery,
/// not merely an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProviderLogEntry {
    pub id: String,
    pub org_id: String,
    pub provider: String,
    pub message_id: String,
    pub payload: String,
    pub success: bool,
    pub extracted: bool,
    pub error_message: Option<String>,
    pub processing_time_ms: i64,
    pub correlation_id: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persisted, org-scoped record derived from extracted receipt data
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionRecord {
    pub id: String,
    pub org_id: String,
    pub message_id: String,
    pub txn_date: String,
    pub amount: f64,
    pub currency: String,
    pub merchant: String,
    pub last4: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub notes: Option<String>,
    pub confidence: i64,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

/// A learned merchant→category association created from a user correction
///
/// `merchant_normalized` is unique per organization so variant spellings of
/// the same merchant converge to one row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MerchantMapping {
    pub id: String,
    pub org_id: String,
    pub merchant_normalized: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
