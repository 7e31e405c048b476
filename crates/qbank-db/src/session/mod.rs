//! Upload session persistence

mod memory;
mod postgres;
mod store;

pub use memory::InMemorySessionStore;
pub use postgres::PgSessionStore;
pub use store::SessionStore;
