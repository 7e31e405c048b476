use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use qbank_core::AppError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::periodic::spawn_periodic;

const DEFAULT_SHARDS: usize = 16;

/// Accepted request timestamps for one key, oldest first.
///
/// The buffer grows with actual hits. Rejected requests are never recorded, so it
/// never holds more than `limit` entries.
#[derive(Debug, Default)]
struct SlidingWindow {
    hits: VecDeque<Instant>,
}

impl SlidingWindow {

    /// Drop timestamps that fell out of the trailing window.
    fn trim(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.hits.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    fn try_record(&mut self, now: Instant, limit: usize) -> bool {
        if self.hits.len() >= limit {
            return false;
        }
        self.hits.push_back(now);
        true
    }

    fn reset_after(&self, now: Instant, window: Duration) -> Duration {
        match self.hits.front() {
            Some(oldest) => window.saturating_sub(now.saturating_duration_since(*oldest)),
            None => window,
        }
    }
}

/// Sliding-window rate limiter keyed by an opaque string (typically a client IP).
///
/// State is split across shards so that unrelated keys do not contend on one lock.
/// Instances share nothing; build one per endpoint class.
pub struct RateLimiter {
    shards: Vec<Mutex<HashMap<String, SlidingWindow>>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` requests per key in any trailing `window`.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_shards(limit, window, DEFAULT_SHARDS)
    }

    /// Create a limiter with a custom shard count
    pub fn with_shards(limit: u32, window: Duration, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            shards,
            limit,
            window,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, SlidingWindow>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Admit or reject one request for `key`.
    ///
    /// Expired timestamps are dropped first; the request is recorded only when it is
    /// admitted.
    pub async fn is_allowed(&self, key: &str) -> bool {
        let now = Instant::now();
        let limit = self.limit as usize;
        let mut windows = self.shard(key).lock().await;

        let window = windows
            .entry(key.to_string())
            .or_default();
        window.trim(now, self.window);
        let allowed = window.try_record(now, limit);

        if !allowed {
            tracing::debug!(
                key = %key,
                limit = self.limit,
                window_secs = self.window.as_secs(),
                "Rate limit exceeded"
            );
        }
        allowed
    }

    /// Like [`is_allowed`](Self::is_allowed) but reports rejection as
    /// [`AppError::RateLimited`] with the seconds until a slot frees up.
    pub async fn check(&self, key: &str) -> Result<(), AppError> {
        if self.is_allowed(key).await {
            return Ok(());
        }
        let wait = self.reset_after(key).await;
        let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        Err(AppError::RateLimited {
            retry_after_secs: retry_after_secs.max(1),
        })
    }

    /// Requests `key` may still make in the current window.
    pub async fn remaining(&self, key: &str) -> u32 {
        let now = Instant::now();
        let windows = self.shard(key).lock().await;
        let used = windows
            .get(key)
            .map(|w| {
                w.hits
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < self.window)
                    .count()
            })
            .unwrap_or(0);
        self.limit.saturating_sub(used as u32)
    }

    /// Time until the oldest retained request for `key` leaves the window.
    ///
    /// A key with no history reports the full window.
    pub async fn reset_after(&self, key: &str) -> Duration {
        let now = Instant::now();
        let mut windows = self.shard(key).lock().await;
        match windows.get_mut(key) {
            Some(window) => {
                window.trim(now, self.window);
                window.reset_after(now, self.window)
            }
            None => self.window,
        }
    }

    /// Trim every key and evict those left with no history.
    ///
    /// Returns the number of evicted keys. A key with any timestamp inside the
    /// window is never evicted.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        let mut tracked = 0;

        for shard in &self.shards {
            let mut windows = shard.lock().await;
            let before = windows.len();
            windows.retain(|_key, window| {
                window.trim(now, self.window);
                window.hits.shrink_to_fit();
                !window.hits.is_empty()
            });
            evicted += before - windows.len();
            tracked += windows.len();
        }

        if evicted > 0 {
            tracing::debug!(
                keys_evicted = evicted,
                keys_tracked = tracked,
                "Swept idle rate limit windows"
            );
        }
        evicted
    }

    /// Number of keys currently holding history
    pub async fn tracked_keys(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }

    #[cfg(test)]
    async fn reserved_slots(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard
                .lock()
                .await
                .values()
                .map(|w| w.hits.capacity())
                .sum::<usize>();
        }
        total
    }

    /// Run [`sweep`](Self::sweep) every `every` until `cancel` fires.
    pub fn start_sweeper(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        spawn_periodic("rate_limit_sweep", every, cancel, move || {
            let limiter = self.clone();
            async move {
                limiter.sweep().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rejects_past_limit_and_recovers_after_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(limiter.is_allowed("10.0.0.1").await);
        }
        assert_eq!(seen, vec![true, true, false]);

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(limiter.is_allowed("10.0.0.1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_rather_than_resetting() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));

        assert!(limiter.is_allowed("k").await);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(limiter.is_allowed("k").await);
        assert!(!limiter.is_allowed("k").await);

        // First hit leaves the window at t=10, the second stays until t=16.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(limiter.is_allowed("k").await);
        assert!(!limiter.is_allowed("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn admitted_count_never_exceeds_limit_in_any_window() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10));
        let mut admitted: Vec<Instant> = Vec::new();

        for _ in 0..200 {
            if limiter.is_allowed("burst").await {
                admitted.push(Instant::now());
            }
            tokio::time::advance(Duration::from_millis(250)).await;
        }

        for (i, start) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|t| t.duration_since(*start) < Duration::from_secs(10))
                .count();
            assert!(in_window <= 5);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn keys_and_instances_are_independent() {
        let upload = RateLimiter::new(1, Duration::from_secs(60));
        let general = RateLimiter::new(1, Duration::from_secs(60));

        assert!(upload.is_allowed("a").await);
        assert!(!upload.is_allowed("a").await);
        assert!(upload.is_allowed("b").await);
        assert!(general.is_allowed("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_only_idle_keys() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));

        limiter.is_allowed("idle").await;
        tokio::time::advance(Duration::from_secs(8)).await;
        limiter.is_allowed("live").await;
        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(limiter.sweep().await, 1);
        assert_eq!(limiter.tracked_keys().await, 1);
        assert_eq!(limiter.remaining("live").await, 2);
        assert_eq!(limiter.remaining("idle").await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_and_reset_after() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert_eq!(limiter.remaining("ip").await, 3);
        assert_eq!(limiter.reset_after("ip").await, Duration::from_secs(60));

        limiter.is_allowed("ip").await;
        tokio::time::advance(Duration::from_secs(20)).await;
        limiter.is_allowed("ip").await;

        assert_eq!(limiter.remaining("ip").await, 1);
        assert_eq!(limiter.reset_after("ip").await, Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn check_reports_retry_after() {
        let limiter = RateLimiter::new(1, Duration::from_secs(30));
        assert!(limiter.check("ip").await.is_ok());

        tokio::time::advance(Duration::from_secs(10)).await;
        match limiter.check("ip").await {
            Err(AppError::RateLimited { retry_after_secs }) => assert_eq!(retry_after_secs, 20),
            other => panic!("expected rate limit error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_cancel() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(5)));
        limiter.is_allowed("a").await;

        let cancel = CancellationToken::new();
        let handle = limiter
            .clone()
            .start_sweeper(Duration::from_secs(60), cancel.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(limiter.tracked_keys().await, 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn storage_grows_with_hits_not_limit() {
        let limiter = RateLimiter::new(200, Duration::from_secs(3600));
        for i in 0..1000 {
            assert!(limiter.is_allowed(&format!("10.0.{}.{}", i / 256, i % 256)).await);
        }

        assert_eq!(limiter.tracked_keys().await, 1000);
        assert!(limiter.reserved_slots().await <= 1000 * 8);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_limit_does_not_preallocate() {
        let limiter = RateLimiter::new(u32::MAX, Duration::from_secs(3600));
        assert!(limiter.is_allowed("ip").await);
        assert!(limiter.reserved_slots().await < 64);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_releases_trimmed_capacity() {
        let limiter = RateLimiter::new(100, Duration::from_secs(10));
        for _ in 0..100 {
            limiter.is_allowed("burst").await;
        }
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(limiter.is_allowed("burst").await);
        assert!(limiter.reserved_slots().await >= 100);

        assert_eq!(limiter.sweep().await, 0);
        assert!(limiter.reserved_slots().await < 100);
        assert_eq!(limiter.remaining("burst").await, 99);
    }
}
