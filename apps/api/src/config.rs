use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Unset means the in-process upload lock (single instance only).
    pub redis_url: Option<String>,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    /// Prefix for resume URLs handed back to clients.
    pub s3_public_base_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub tesseract_bin: String,
    pub ocr_language: String,
    pub ocr_timeout: Duration,
    pub max_upload_bytes: usize,
    pub upload_lock_ttl: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let s3_bucket = require("S3_BUCKET")?;
        let s3_endpoint = require("S3_ENDPOINT")?;
        let s3_public_base_url = lookup("S3_PUBLIC_BASE_URL").unwrap_or_else(|| {
            format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket)
        });

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").filter(|v| !v.trim().is_empty()),
            s3_region: optional("S3_REGION", "us-east-1"),
            s3_public_base_url,
            s3_bucket,
            s3_endpoint,
            aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            tesseract_bin: optional("TESSERACT_BIN", "tesseract"),
            ocr_language: optional("OCR_LANGUAGE", "eng"),
            ocr_timeout: Duration::from_secs(
                optional("OCR_TIMEOUT_SECS", "60")
                    .parse::<u64>()
                    .context("OCR_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            max_upload_bytes: match lookup("MAX_UPLOAD_BYTES") {
                Some(v) => v
                    .parse::<usize>()
                    .context("MAX_UPLOAD_BYTES must be a byte count")?,
                None => DEFAULT_MAX_UPLOAD_BYTES,
            },
            upload_lock_ttl: Duration::from_secs(
                optional("UPLOAD_LOCK_TTL_SECS", "120")
                    .parse::<u64>()
                    .context("UPLOAD_LOCK_TTL_SECS must be a whole number of seconds")?,
            ),
            port: optional("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional("RUST_LOG", "info"),
        })
    }
}
