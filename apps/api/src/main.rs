mod auth;
mod companies;
mod config;
mod db;
mod errors;
mod jobs;
mod models;
mod placement;
mod profile;
mod resume;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::create_pool;
use crate::profile::PgProfileStore;
use crate::resume::lock::{LocalSessionLock, RedisSessionLock, SessionLock};
use crate::resume::ocr::{OcrCapability, OcrEngine, TesseractCli};
use crate::resume::orchestrator::ResumePipeline;
use crate::resume::progress::ProgressBoard;
use crate::resume::storage::S3Storage;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Placement API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let profiles = Arc::new(PgProfileStore::new(db.clone()));

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let storage = Arc::new(S3Storage::new(
        s3,
        config.s3_bucket.clone(),
        config.s3_public_base_url.clone(),
    ));
    info!("S3 client initialized");

    // Probe OCR once; images are refused for the life of the process if it is not ready
    let ocr = Arc::new(TesseractCli::new(
        &config.tesseract_bin,
        &config.ocr_language,
        config.ocr_timeout,
    ));
    let ocr_capability = ocr.probe().await;
    match ocr_capability {
        OcrCapability::Ready => info!("OCR ready ({})", config.ocr_language),
        OcrCapability::Unavailable => {
            warn!("OCR unavailable; image resumes will be refused until restart")
        }
    }

    // Single-flight upload lock: Redis when configured, otherwise in-process
    let locks: Arc<dyn SessionLock> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis upload lock initialized");
            Arc::new(RedisSessionLock::new(client, config.upload_lock_ttl))
        }
        None => {
            info!("REDIS_URL not set; using in-process upload lock");
            Arc::new(LocalSessionLock::new())
        }
    };

    let pipeline = ResumePipeline::new(storage, ocr, profiles.clone(), locks);

    // Build app state
    let state = AppState {
        db,
        profiles,
        pipeline: Arc::new(pipeline),
        progress: ProgressBoard::new(),
        ocr_capability,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "placement-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
