//! QBank Infrastructure Library
//!
//! Shared infrastructure for the upload subsystem:
//! - Telemetry initialization
//! - Sliding-window rate limiting
//! - Cancellable periodic background tasks

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "periodic")]
pub mod periodic;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

#[cfg(feature = "periodic")]
pub use periodic::spawn_periodic;

#[cfg(feature = "rate-limit")]
pub use rate_limit::{EndpointClass, RateLimiter, RateLimiters};
