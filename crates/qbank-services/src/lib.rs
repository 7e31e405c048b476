//! QBank Services Library
//!
//! Upload orchestration: provisional batch upload, exactly-once session
//! consumption, bounded-concurrency migration to permanent storage and
//! failure analysis. [`UploadRuntime`] wires the pieces together.

pub mod analysis;
pub mod finalize;
pub mod migration;
pub mod provisional;
pub mod runtime;
pub mod session;
pub mod validation;

// Re-export commonly used types
pub use analysis::{analyze, is_network_error, UploadAnalysis, Verdict};
pub use finalize::{FinalizeOutcome, FinalizeService};
pub use migration::{ConcurrentMediaMigrator, Destination, MigrationReport};
pub use provisional::{BatchUploadOutcome, ProvisionalUploadService};
pub use runtime::UploadRuntime;
pub use session::UploadSessionTracker;
pub use validation::{detect_content_type, FileValidationError, FileValidator, IncomingFile};
