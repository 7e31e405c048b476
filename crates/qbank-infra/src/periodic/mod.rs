//! Cancellable periodic background tasks
//!
//! Background sweeps run on a `tokio::time::interval` and stop as soon as their
//! `CancellationToken` fires. The first tick is skipped so a sweep never runs at
//! startup.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Spawn `tick` every `every` until `cancel` is triggered.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    every: Duration,
    cancel: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        tracing::info!(
            task = name,
            interval_secs = every.as_secs(),
            "Periodic task started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(task = name, "Periodic task stopped");
                    break;
                }
                _ = interval.tick() => {
                    tick().await;
                }
            }
        }
    })
}
