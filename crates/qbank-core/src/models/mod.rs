//! Domain models for the upload subsystem

pub mod migration;
pub mod session;
pub mod upload;

pub use migration::{basename, AggregateOutcome, ItemOutcome, LifecycleState, MigrationItem};
pub use session::UploadSession;
pub use upload::{FinalizeRequest, OutcomeRecord, UploadResponse, UploadResult};
