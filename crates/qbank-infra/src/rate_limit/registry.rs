use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use qbank_core::{AppError, UploadConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::RateLimiter;

/// Endpoint families with their own request budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    /// File upload endpoints (50/hour by default)
    Upload,
    /// Everything else (200/hour by default)
    General,
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointClass::Upload => f.write_str("upload"),
            EndpointClass::General => f.write_str("general"),
        }
    }
}

/// One limiter per endpoint class, built once at startup.
#[derive(Clone)]
pub struct RateLimiters {
    upload: Arc<RateLimiter>,
    general: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn new(upload: RateLimiter, general: RateLimiter) -> Self {
        Self {
            upload: Arc::new(upload),
            general: Arc::new(general),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            RateLimiter::new(config.upload_rate_limit, config.rate_limit_window),
            RateLimiter::new(config.general_rate_limit, config.rate_limit_window),
        )
    }

    pub fn get(&self, class: EndpointClass) -> &Arc<RateLimiter> {
        match class {
            EndpointClass::Upload => &self.upload,
            EndpointClass::General => &self.general,
        }
    }

    pub async fn is_allowed(&self, class: EndpointClass, key: &str) -> bool {
        self.get(class).is_allowed(key).await
    }

    #[tracing::instrument(skip(self), fields(class = %class))]
    pub async fn check(&self, class: EndpointClass, key: &str) -> Result<(), AppError> {
        self.get(class).check(key).await
    }

    /// Sweep every limiter, returning the total number of evicted keys.
    pub async fn sweep(&self) -> usize {
        self.upload.sweep().await + self.general.sweep().await
    }

    /// Start one sweeper per limiter under the same cancellation token.
    pub fn start_sweepers(
        &self,
        every: Duration,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        vec![
            self.upload.clone().start_sweeper(every, cancel.clone()),
            self.general.clone().start_sweeper(every, cancel.clone()),
        ]
    }
}
