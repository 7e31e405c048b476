//! Sliding-window rate limiting
//!
//! [`RateLimiter`] admits at most `limit` requests per key in any trailing window.
//! [`RateLimiters`] holds one independent limiter per endpoint class.

mod limiter;
mod registry;

pub use limiter::RateLimiter;
pub use registry::{EndpointClass, RateLimiters};
