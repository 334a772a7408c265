//! Idempotency ledger
//!
//! One row per ingestion attempt, unique on `(org_id, message_id)`. Claiming
//! is a single atomic `INSERT ... ON CONFLICT DO NOTHING`: two webhook
//! retries arriving within milliseconds of each other race at the storage
//! layer, never in application code.

use crate::error::IngestError;
use chrono::Utc;
use rcpt_common::db::models::ProviderLogEntry;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Outcome of attempting to claim a message for processing
pub enum LedgerClaim {
    /// This request owns processing; finalize the row when done
    Claimed { log_id: String },
    /// Another delivery of the same message got here first
    Duplicate { entry: ProviderLogEntry },
}

pub async fn claim(
    pool: &SqlitePool,
    org_id: Uuid,
    provider: &str,
    message_id: &str,
    payload_json: &str,
    correlation_id: Uuid,
) -> Result<LedgerClaim, IngestError> {
    let log_id = Uuid::new_v4().to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO provider_log
            (id, org_id, provider, message_id, payload, success, extracted,
             processing_time_ms, correlation_id, created_at)
        VALUES (?, ?, ?, ?, ?, 0, 0, 0, ?, ?)
        ON CONFLICT(org_id, message_id) DO NOTHING
        "#,
    )
    .bind(&log_id)
    .bind(org_id.to_string())
    .bind(provider)
    .bind(message_id)
    .bind(payload_json)
    .bind(correlation_id.to_string())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(LedgerClaim::Claimed { log_id });
    }

    let entry = fetch(pool, org_id, message_id)
        .await?
        .ok_or_else(|| IngestError::Common(rcpt_common::Error::Internal(
            "ledger conflict reported but no existing row found".to_string(),
        )))?;
    Ok(LedgerClaim::Duplicate { entry })
}

/// Record the processing outcome on a claimed row
pub async fn finalize(
    pool: &SqlitePool,
    log_id: &str,
    success: bool,
    extracted: bool,
    error_message: Option<&str>,
    transaction_id: Option<&str>,
    processing_time_ms: i64,
) -> Result<(), IngestError> {
    sqlx::query(
        r#"
        UPDATE provider_log
        SET success = ?, extracted = ?, error_message = ?,
            transaction_id = ?, processing_time_ms = ?
        WHERE id = ?
        "#,
    )
    .bind(success)
    .bind(extracted)
    .bind(error_message)
    .bind(transaction_id)
    .bind(processing_time_ms)
    .bind(log_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch(
    pool: &SqlitePool,
    org_id: Uuid,
    message_id: &str,
) -> Result<Option<ProviderLogEntry>, IngestError> {
    let entry = sqlx::query_as::<_, ProviderLogEntry>(
        r#"
        SELECT id, org_id, provider, message_id, payload, success, extracted,
               error_message, processing_time_ms, correlation_id, transaction_id, created_at
        FROM provider_log
        WHERE org_id = ? AND message_id = ?
        "#,
    )
    .bind(org_id.to_string())
    .bind(message_id)
    .fetch_optional(pool)
    .await?;
    Ok(entry)
}

pub async fn count_for_org(pool: &SqlitePool, org_id: Uuid) -> Result<i64, IngestError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM provider_log WHERE org_id = ?")
        .bind(org_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
