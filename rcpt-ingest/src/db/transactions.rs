//! Transaction rows derived from extracted receipt data

use crate::error::IngestError;
use crate::extractor::ReceiptData;
use chrono::Utc;
use rcpt_common::db::models::TransactionRecord;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Persist a transaction for an organization, returning its id
pub async fn insert(
    pool: &SqlitePool,
    org_id: Uuid,
    message_id: &str,
    receipt: &ReceiptData,
) -> Result<String, IngestError> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO transactions
            (id, org_id, message_id, txn_date, amount, currency, merchant, last4,
             category, subcategory, notes, confidence, explanation, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(org_id.to_string())
    .bind(message_id)
    .bind(receipt.date.to_string())
    .bind(receipt.amount)
    .bind(&receipt.currency)
    .bind(&receipt.merchant)
    .bind(&receipt.last4)
    .bind(&receipt.category)
    .bind(&receipt.subcategory)
    .bind(&receipt.notes)
    .bind(receipt.confidence as i64)
    .bind(&receipt.explanation)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(id)
}

/// Org-scoped fetch. A transaction belonging to another organization is
/// indistinguishable from one that does not exist.
pub async fn get(
    pool: &SqlitePool,
    org_id: Uuid,
    id: &str,
) -> Result<Option<TransactionRecord>, IngestError> {
    let row = sqlx::query_as::<_, TransactionRecord>(
        r#"
        SELECT id, org_id, message_id, txn_date, amount, currency, merchant, last4,
               category, subcategory, notes, confidence, explanation, created_at
        FROM transactions
        WHERE id = ? AND org_id = ?
        "#,
    )
    .bind(id)
    .bind(org_id.to_string())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Apply a user category correction, org-scoped. Returns the updated row, or
/// None when the transaction is not visible to this organization.
pub async fn update_category(
    pool: &SqlitePool,
    org_id: Uuid,
    id: &str,
    category: &str,
    subcategory: Option<&str>,
) -> Result<Option<TransactionRecord>, IngestError> {
    let result = sqlx::query(
        "UPDATE transactions SET category = ?, subcategory = ? WHERE id = ? AND org_id = ?",
    )
    .bind(category)
    .bind(subcategory)
    .bind(id)
    .bind(org_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, org_id, id).await
}
