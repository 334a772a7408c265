//! Integration tests for corrections, merchant mappings, and the learning loop

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

use async_trait::async_trait;
use rcpt_ingest::config::{CloudflareSettings, ProvidersConfig, SesSettings};
use rcpt_ingest::db::{organizations, transactions};
use rcpt_ingest::error::IngestError;
use rcpt_ingest::extractor::{Extractor, ReceiptData};
use rcpt_ingest::merchant_map::MerchantMapService;
use rcpt_ingest::payload::CanonicalPayload;
use rcpt_ingest::pipeline::IngestionPipeline;
use rcpt_ingest::providers::ProviderRegistry;
use rcpt_ingest::rate_limit::OrgRateLimiter;
use rcpt_ingest::{build_router, AppState};

struct StubExtractor;

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, _payload: &CanonicalPayload) -> Result<ReceiptData, IngestError> {
        Ok(receipt())
    }
}

fn receipt() -> ReceiptData {
    ReceiptData {
        date: NaiveDate::from_ymd_opt(2026, 8, 30).unwrap(),
        amount: 42.00,
        currency: "USD".to_string(),
        merchant: "Acme Widgets Inc.".to_string(),
        last4: None,
        category: "Shopping".to_string(),
        subcategory: None,
        notes: None,
        confidence: 70,
        explanation: "stub extraction".to_string(),
    }
}

struct TestApp {
    app: axum::Router,
    db: SqlitePool,
    service: MerchantMapService,
    _tmp: TempDir,
}

async fn setup() -> TestApp {
    let tmp = TempDir::new().expect("temp dir");
    let db = rcpt_common::db::init_database(&tmp.path().join("test.db"))
        .await
        .expect("init database");

    let registry = Arc::new(ProviderRegistry::new(ProvidersConfig {
        default_provider: "cloudflare".to_string(),
        cloudflare: CloudflareSettings {
            secret: Some("s".to_string()),
            timeout_ms: 5000,
        },
        ses: SesSettings {
            verify_signatures: false,
            timeout_ms: 5000,
        },
        health_cache_secs: 30,
    }));
    let service = MerchantMapService::new(db.clone());
    let pipeline = Arc::new(IngestionPipeline::new(
        db.clone(),
        Arc::clone(&registry),
        Arc::new(OrgRateLimiter::new(60)),
        Arc::new(StubExtractor),
        service.clone(),
    ));
    let app = build_router(AppState::new(db.clone(), registry, pipeline, service.clone()));
    TestApp {
        app,
        db,
        service,
        _tmp: tmp,
    }
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

#[tokio::test]
async fn repeated_corrections_keep_one_mapping_row() {
    let t = setup().await;
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();

    let first = t
        .service
        .update(org, "Acme Widgets Inc.", "Hardware", None, user)
        .await
        .unwrap();

    // Timestamps must observably advance between the two corrections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let second = t
        .service
        .update(org, "ACME WIDGETS", "Office Supplies", Some("Tools"), user)
        .await
        .unwrap();

    // Same normalized merchant: overwritten in place, never duplicated
    assert_eq!(second.merchant_normalized, first.merchant_normalized);
    assert_eq!(second.category, "Office Supplies");
    assert_eq!(second.subcategory.as_deref(), Some("Tools"));
    assert!(second.updated_at > first.updated_at);
    assert_eq!(second.created_at, first.created_at);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM merchant_mappings WHERE org_id = ?")
        .bind(org.to_string())
        .fetch_one(&t.db)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn learned_mapping_rewrites_future_extractions() {
    let t = setup().await;
    let org = Uuid::new_v4();

    t.service
        .update(org, "Acme Widgets", "Hardware", Some("Tools"), Uuid::new_v4())
        .await
        .unwrap();

    let fused = t.service.apply_mapping(receipt(), org).await.unwrap();
    assert_eq!(fused.category, "Hardware");
    assert_eq!(fused.subcategory.as_deref(), Some("Tools"));
    assert_eq!(fused.confidence, 85); // 70 + bonus
    assert!(fused.explanation.starts_with("stub extraction"));
    assert!(fused
        .explanation
        .contains("Applied learned categorization from previous user correction"));
}

#[tokio::test]
async fn unmapped_merchant_passes_through_unchanged() {
    let t = setup().await;
    let fused = t
        .service
        .apply_mapping(receipt(), Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(fused, receipt());
}

#[tokio::test]
async fn empty_merchant_is_identity_even_with_mappings_present() {
    let t = setup().await;
    let org = Uuid::new_v4();
    t.service
        .update(org, "Acme Widgets", "Hardware", None, Uuid::new_v4())
        .await
        .unwrap();

    let mut blank = receipt();
    blank.merchant = "   ".to_string();
    let fused = t.service.apply_mapping(blank.clone(), org).await.unwrap();
    assert_eq!(fused, blank);
}

#[tokio::test]
async fn mappings_are_tenant_isolated() {
    let t = setup().await;
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();

    t.service
        .update(org_a, "Acme Widgets", "Hardware", None, Uuid::new_v4())
        .await
        .unwrap();

    // Org B sees no mapping, and its extractions are untouched
    assert!(t
        .service
        .lookup(org_b, "Acme Widgets")
        .await
        .unwrap()
        .is_none());
    let fused = t.service.apply_mapping(receipt(), org_b).await.unwrap();
    assert_eq!(fused, receipt());

    // Both orgs can hold the same normalized merchant independently
    t.service
        .update(org_b, "Acme Widgets", "Toys", None, Uuid::new_v4())
        .await
        .unwrap();
    let a = t.service.lookup(org_a, "Acme Widgets").await.unwrap().unwrap();
    let b = t.service.lookup(org_b, "Acme Widgets").await.unwrap().unwrap();
    assert_eq!(a.category, "Hardware");
    assert_eq!(b.category, "Toys");
}

#[tokio::test]
async fn correction_endpoint_updates_transaction_and_learns_mapping() {
    let t = setup().await;
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();
    organizations::insert(&t.db, org, "Test Org").await.unwrap();

    let txn_id = transactions::insert(&t.db, org, "msg-correct", &receipt())
        .await
        .unwrap();

    let correction = serde_json::json!({
        "org_id": org,
        "user_id": user,
        "category": "Office Supplies",
        "subcategory": "Widgets"
    });
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/transactions/{}/category", txn_id))
                .header("content-type", "application/json")
                .body(Body::from(correction.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["transaction"]["category"], "Office Supplies");
    assert_eq!(body["transaction"]["subcategory"], "Widgets");
    assert_eq!(body["mapping"]["merchant_normalized"], "acme widgets");
    assert_eq!(body["mapping"]["category"], "Office Supplies");

    // The mapping now steers fresh extractions of the same merchant
    let fused = t.service.apply_mapping(receipt(), org).await.unwrap();
    assert_eq!(fused.category, "Office Supplies");
}

#[tokio::test]
async fn correcting_another_orgs_transaction_is_404() {
    let t = setup().await;
    let owner = Uuid::new_v4();
    organizations::insert(&t.db, owner, "Owner").await.unwrap();
    let txn_id = transactions::insert(&t.db, owner, "msg-foreign", &receipt())
        .await
        .unwrap();

    let correction = serde_json::json!({
        "org_id": Uuid::new_v4(),
        "user_id": Uuid::new_v4(),
        "category": "Stolen"
    });
    let response = t
        .app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/transactions/{}/category", txn_id))
                .header("content-type", "application/json")
                .body(Body::from(correction.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The owner's transaction is untouched and no mapping was learned
    let record = transactions::get(&t.db, owner, &txn_id).await.unwrap().unwrap();
    assert_eq!(record.category, "Shopping");
    let mappings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM merchant_mappings")
        .fetch_one(&t.db)
        .await
        .unwrap();
    assert_eq!(mappings, 0);
}

#[tokio::test]
async fn stats_report_counts_and_top_categories() {
    let t = setup().await;
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();

    for merchant in ["Alpha", "Beta", "Gamma"] {
        t.service
            .update(org, merchant, "Food & Drink", None, user)
            .await
            .unwrap();
    }
    t.service
        .update(org, "Delta", "Travel", None, user)
        .await
        .unwrap();

    let response = t
        .app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/mappings/stats?org_id={}", org))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats = extract_json(response.into_body()).await;
    assert_eq!(stats["total_mappings"], 4);
    assert_eq!(stats["recent_mappings"], 4);
    let top = stats["top_categories"].as_array().unwrap();
    assert_eq!(top[0]["category"], "Food & Drink");
    assert_eq!(top[0]["count"], 3);
    assert_eq!(top[1]["category"], "Travel");
    assert_eq!(top[1]["count"], 1);
}
