//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up
//! idempotently. Safe to call at every service start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers with one writer; webhook retries for
    // the same message can arrive within milliseconds of each other
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation (idempotent - safe to call multiple times)
    create_organizations_table(&pool).await?;
    create_organization_aliases_table(&pool).await?;
    create_provider_log_table(&pool).await?;
    create_transactions_table(&pool).await?;
    create_merchant_mappings_table(&pool).await?;

    Ok(pool)
}

async fn create_organizations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_organization_aliases_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organization_aliases (
            alias TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// The idempotency ledger
///
/// The UNIQUE constraint on `(org_id, message_id)` is the sole mechanism
/// preventing duplicate processing under concurrent redelivery. Insert-or-
/// detect-conflict must happen here at the storage layer, never as a
/// read-then-write in application code.
async fn create_provider_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS provider_log (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id),
            provider TEXT NOT NULL,
            message_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            success INTEGER NOT NULL DEFAULT 0,
            extracted INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            processing_time_ms INTEGER NOT NULL DEFAULT 0,
            correlation_id TEXT NOT NULL,
            transaction_id TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(org_id, message_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_transactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id),
            message_id TEXT NOT NULL,
            txn_date TEXT NOT NULL,
            amount REAL NOT NULL,
            currency TEXT NOT NULL,
            merchant TEXT NOT NULL,
            last4 TEXT,
            category TEXT NOT NULL,
            subcategory TEXT,
            notes TEXT,
            confidence INTEGER NOT NULL,
            explanation TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Merchant mappings converge concurrent corrections at the storage layer:
/// merchant name is unique per organization, and writers upsert on conflict.
async fn create_merchant_mappings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS merchant_mappings (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id),
            merchant_normalized TEXT NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(org_id, merchant_normalized)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
