//! Organization alias lookups
//!
//! Aliases are read-only from the pipeline's perspective; `insert` exists for
//! provisioning and tests.

use crate::error::IngestError;
use chrono::Utc;
use rcpt_common::db::models::OrganizationAlias;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Look up an alias row. The caller decides what an inactive alias means.
pub async fn resolve(
    pool: &SqlitePool,
    alias: &str,
) -> Result<Option<OrganizationAlias>, IngestError> {
    let row = sqlx::query_as::<_, OrganizationAlias>(
        "SELECT alias, org_id, is_active, created_at FROM organization_aliases WHERE alias = ?",
    )
    .bind(alias)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn insert(
    pool: &SqlitePool,
    alias: &str,
    org_id: Uuid,
    is_active: bool,
) -> Result<(), IngestError> {
    sqlx::query(
        "INSERT INTO organization_aliases (alias, org_id, is_active, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(alias)
    .bind(org_id.to_string())
    .bind(is_active)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}
