//! Tracing initialization
//!
//! Installs a `tracing_subscriber` registry with an env-driven filter and a fmt layer.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry};
