//! QBank Database Library
//!
//! Persistence for upload sessions. The [`SessionStore`] contract has an in-memory
//! implementation for single-process deployments and tests, and a Postgres
//! implementation backed by the `temporary_uploads` table.

pub mod session;
pub mod setup;

pub use session::{InMemorySessionStore, PgSessionStore, SessionStore};
pub use setup::setup_database;
