//! Upload subsystem wiring
//!
//! Builds every component once from an [`UploadConfig`] and owns the background
//! sweeps. All sweeps share one cancellation token; [`UploadRuntime::shutdown`]
//! cancels it and waits for them to stop.

use std::sync::Arc;

use qbank_core::{AppError, UploadConfig};
use qbank_db::{setup_database, InMemorySessionStore, PgSessionStore, SessionStore};
use qbank_infra::{init_telemetry, RateLimiters};
use qbank_storage::{LocalMediaBackend, MediaBackend};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::finalize::FinalizeService;
use crate::migration::ConcurrentMediaMigrator;
use crate::provisional::ProvisionalUploadService;
use crate::session::UploadSessionTracker;

const DB_MAX_CONNECTIONS: u32 = 10;
const SERVICE_NAME: &str = "qbank-uploads";

pub struct UploadRuntime {
    config: UploadConfig,
    limiters: RateLimiters,
    tracker: Arc<UploadSessionTracker>,
    migrator: Arc<ConcurrentMediaMigrator>,
    uploader: Arc<ProvisionalUploadService>,
    finalizer: Arc<FinalizeService>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl UploadRuntime {
    /// Build the component graph and start the rate-limit sweepers and the
    /// session reaper.
    pub fn start(
        config: UploadConfig,
        backend: Arc<dyn MediaBackend>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, AppError> {
        let mut runtime = Self::with_sweeps_disabled(config, backend, store)?;

        let mut tasks = runtime
            .limiters
            .start_sweepers(runtime.config.rate_limit_sweep_interval, &runtime.cancel);
        tasks.push(
            runtime
                .tracker
                .clone()
                .start_reaper(runtime.config.session_sweep_interval, runtime.cancel.clone()),
        );
        runtime.tasks = tasks;

        tracing::info!(
            upload_concurrency = runtime.config.upload_concurrency,
            migration_concurrency = runtime.config.migration_concurrency,
            background_tasks = runtime.tasks.len(),
            "Upload runtime started"
        );
        Ok(runtime)
    }

    /// Build the same graph without background tasks; sweeps run only when called.
    pub fn with_sweeps_disabled(
        config: UploadConfig,
        backend: Arc<dyn MediaBackend>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, AppError> {
        config
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let limiters = RateLimiters::from_config(&config);
        let tracker = Arc::new(UploadSessionTracker::from_config(store, &config)?);
        let migrator = Arc::new(ConcurrentMediaMigrator::new(
            backend.clone(),
            config.migration_concurrency,
        ));
        let uploader = Arc::new(ProvisionalUploadService::from_config(
            backend,
            tracker.clone(),
            &config,
        ));
        let finalizer = Arc::new(FinalizeService::new(tracker.clone(), migrator.clone()));

        Ok(Self {
            config,
            limiters,
            tracker,
            migrator,
            uploader,
            finalizer,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }

    /// Start a runtime with the local media backend and either the Postgres
    /// session store (when `database_url` is set) or the in-memory one.
    ///
    /// Also installs the tracing subscriber, with JSON output in production. An
    /// already installed subscriber is left in place.
    pub async fn bootstrap(config: UploadConfig) -> Result<Self, AppError> {
        let json_logs = config.is_production();
        if let Err(e) = init_telemetry(SERVICE_NAME, &config.environment, json_logs) {
            tracing::debug!(error = %e, "Tracing subscriber already installed");
        }

        let backend: Arc<dyn MediaBackend> = Arc::new(
            LocalMediaBackend::new(
                &config.local_storage_path,
                config.local_storage_base_url.clone(),
            )
            .await?,
        );

        let store: Arc<dyn SessionStore> = match &config.database_url {
            Some(url) => {
                let pool = setup_database(url, DB_MAX_CONNECTIONS).await?;
                Arc::new(PgSessionStore::new(pool))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, upload sessions are kept in memory");
                Arc::new(InMemorySessionStore::new())
            }
        };

        Self::start(config, backend, store)
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn limiters(&self) -> &RateLimiters {
        &self.limiters
    }

    pub fn tracker(&self) -> &Arc<UploadSessionTracker> {
        &self.tracker
    }

    pub fn migrator(&self) -> &Arc<ConcurrentMediaMigrator> {
        &self.migrator
    }

    pub fn uploader(&self) -> &Arc<ProvisionalUploadService> {
        &self.uploader
    }

    pub fn finalizer(&self) -> &Arc<FinalizeService> {
        &self.finalizer
    }

    /// Token cancelled on shutdown; pass children of it to long-running finalizes.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Number of background tasks still running
    pub fn background_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Cancel every background task and wait for it to stop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!("Upload runtime stopped");
    }
}
