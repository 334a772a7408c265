//! Organization rows

use crate::error::IngestError;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn insert(pool: &SqlitePool, org_id: Uuid, name: &str) -> Result<(), IngestError> {
    sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?, ?, ?)")
        .bind(org_id.to_string())
        .bind(name)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}
