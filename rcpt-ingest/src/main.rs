//! rcpt-ingest - Receipt email ingestion service
//!
//! Accepts inbound mail webhooks from Cloudflare Email Workers and AWS
//! SES/SNS, turns receipt emails into categorized transactions, and learns
//! merchant categorizations from user corrections.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use rcpt_ingest::config::IngestConfig;
use rcpt_ingest::extractor::HttpExtractor;
use rcpt_ingest::merchant_map::MerchantMapService;
use rcpt_ingest::pipeline::IngestionPipeline;
use rcpt_ingest::providers::ProviderRegistry;
use rcpt_ingest::rate_limit::OrgRateLimiter;
use rcpt_ingest::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "rcpt-ingest", about = "Receipt email ingestion service")]
struct Args {
    /// Path to TOML configuration file
    #[arg(long, env = "RCPT_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Listen port (overrides config)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting Receipt Ingestion (rcpt-ingest) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    let mut config = match IngestConfig::resolve(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return Err(e.into());
        }
    };
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    info!("Database path: {}", config.database_path.display());
    let pool = rcpt_common::db::init_database(&config.database_path).await?;
    info!("✓ Database initialized");

    let registry = Arc::new(ProviderRegistry::new(config.providers.clone()));
    info!("✓ Provider registry ready (default: {})", registry.default_provider());

    let extractor = Arc::new(HttpExtractor::new(
        config.extractor.endpoint.clone(),
        config.extractor.timeout_ms,
    )?);
    let rate_limiter = Arc::new(OrgRateLimiter::new(config.rate_limit_per_minute));
    let merchant_map = MerchantMapService::new(pool.clone());
    let pipeline = Arc::new(IngestionPipeline::new(
        pool.clone(),
        Arc::clone(&registry),
        rate_limiter,
        extractor,
        merchant_map.clone(),
    ));

    let state = AppState::new(pool, registry, pipeline, merchant_map);
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("rcpt-ingest listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
