//! Configuration module
//!
//! Settings for the upload subsystem: worker pool bounds, session TTL, rate limits,
//! sweep cadence, file validation and the local storage backend.

use std::env;
use std::time::Duration;

use crate::constants::MAX_FILES_PER_BATCH;

const UPLOAD_CONCURRENCY: usize = 10;
const MIGRATION_CONCURRENCY: usize = 5;
const UPLOAD_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const UPLOAD_RATE_LIMIT_PER_HOUR: u32 = 50;
const GENERAL_RATE_LIMIT_PER_HOUR: u32 = 200;
const RATE_LIMIT_WINDOW_SECS: u64 = 60 * 60;
const RATE_LIMIT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;
const SESSION_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
const MAX_FILE_SIZE_MB: usize = 10;

/// How a finalize manifest is compared with the manifest stored at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestMatch {
    /// Same IDs in the same order.
    #[default]
    Ordered,
    /// Same IDs with the same multiplicity, in any order.
    Unordered,
}

impl ManifestMatch {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ordered" => Some(Self::Ordered),
            "unordered" => Some(Self::Unordered),
            _ => None,
        }
    }
}

/// Upload subsystem configuration
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub environment: String,
    /// Concurrent provisional uploads per batch
    pub upload_concurrency: usize,
    /// Concurrent moves to permanent storage per finalize
    pub migration_concurrency: usize,
    pub session_ttl: Duration,
    pub manifest_match: ManifestMatch,
    pub upload_rate_limit: u32,
    pub general_rate_limit: u32,
    pub rate_limit_window: Duration,
    pub rate_limit_sweep_interval: Duration,
    pub session_sweep_interval: Duration,
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    /// Postgres URL for the session store; in-memory when unset
    pub database_url: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            upload_concurrency: UPLOAD_CONCURRENCY,
            migration_concurrency: MIGRATION_CONCURRENCY,
            session_ttl: Duration::from_secs(UPLOAD_SESSION_TTL_SECS),
            manifest_match: ManifestMatch::Ordered,
            upload_rate_limit: UPLOAD_RATE_LIMIT_PER_HOUR,
            general_rate_limit: GENERAL_RATE_LIMIT_PER_HOUR,
            rate_limit_window: Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
            rate_limit_sweep_interval: Duration::from_secs(RATE_LIMIT_SWEEP_INTERVAL_SECS),
            session_sweep_interval: Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_content_types: default_content_types(),
            local_storage_path: "./data/media".to_string(),
            local_storage_base_url: "http://localhost:4000/media".to_string(),
            database_url: None,
        }
    }
}

fn default_content_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/webp".to_string(),
    ]
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        env::var(name)
            .unwrap_or_else(|_| default.to_string())
            .parse()
            .unwrap_or(default),
    )
}

/// Convert a megabyte limit to bytes, rejecting values that do not fit.
fn file_size_bytes(megabytes: usize) -> Result<usize, anyhow::Error> {
    megabytes
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("MAX_FILE_SIZE_MB is too large: {}", megabytes))
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let manifest_match = match env::var("SESSION_MANIFEST_MATCH") {
            Ok(value) => ManifestMatch::parse(&value).ok_or_else(|| {
                anyhow::anyhow!("SESSION_MANIFEST_MATCH must be 'ordered' or 'unordered'")
            })?,
            Err(_) => ManifestMatch::default(),
        };

        let max_file_size_bytes = file_size_bytes(
            env::var("MAX_FILE_SIZE_MB")
                .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_FILE_SIZE_MB),
        )?;

        let allowed_content_types = env::var("ALLOWED_CONTENT_TYPES")
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| default_content_types());

        let config = UploadConfig {
            environment,
            upload_concurrency: env::var("UPLOAD_CONCURRENCY")
                .unwrap_or_else(|_| UPLOAD_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(UPLOAD_CONCURRENCY),
            migration_concurrency: env::var("MIGRATION_CONCURRENCY")
                .unwrap_or_else(|_| MIGRATION_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(MIGRATION_CONCURRENCY),
            session_ttl: env_secs("UPLOAD_SESSION_TTL_SECS", UPLOAD_SESSION_TTL_SECS),
            manifest_match,
            upload_rate_limit: env::var("UPLOAD_RATE_LIMIT_PER_HOUR")
                .unwrap_or_else(|_| UPLOAD_RATE_LIMIT_PER_HOUR.to_string())
                .parse()
                .unwrap_or(UPLOAD_RATE_LIMIT_PER_HOUR),
            general_rate_limit: env::var("GENERAL_RATE_LIMIT_PER_HOUR")
                .unwrap_or_else(|_| GENERAL_RATE_LIMIT_PER_HOUR.to_string())
                .parse()
                .unwrap_or(GENERAL_RATE_LIMIT_PER_HOUR),
            rate_limit_window: env_secs("RATE_LIMIT_WINDOW_SECS", RATE_LIMIT_WINDOW_SECS),
            rate_limit_sweep_interval: env_secs(
                "RATE_LIMIT_SWEEP_INTERVAL_SECS",
                RATE_LIMIT_SWEEP_INTERVAL_SECS,
            ),
            session_sweep_interval: env_secs(
                "SESSION_SWEEP_INTERVAL_SECS",
                SESSION_SWEEP_INTERVAL_SECS,
            ),
            max_file_size_bytes,
            allowed_content_types,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/media".to_string()),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4000/media".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upload_concurrency == 0 {
            return Err(anyhow::anyhow!("UPLOAD_CONCURRENCY must be at least 1"));
        }
        if self.migration_concurrency == 0 {
            return Err(anyhow::anyhow!("MIGRATION_CONCURRENCY must be at least 1"));
        }
        if self.upload_rate_limit == 0 || self.general_rate_limit == 0 {
            return Err(anyhow::anyhow!("Rate limits must be at least 1 request"));
        }
        if self.rate_limit_window.is_zero() {
            return Err(anyhow::anyhow!("RATE_LIMIT_WINDOW_SECS must be positive"));
        }
        if self.session_ttl.is_zero() {
            return Err(anyhow::anyhow!("UPLOAD_SESSION_TTL_SECS must be positive"));
        }
        if self.rate_limit_sweep_interval.is_zero() || self.session_sweep_interval.is_zero() {
            return Err(anyhow::anyhow!("Sweep intervals must be positive"));
        }
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be at least 1"));
        }
        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES cannot be empty"));
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Fixed cap on files per provisional batch
    pub fn max_files_per_batch(&self) -> usize {
        MAX_FILES_PER_BATCH
    }
}
