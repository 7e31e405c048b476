//! Constants shared across the upload subsystem.

/// Hard cap on files accepted in one provisional batch.
pub const MAX_FILES_PER_BATCH: usize = 5;

/// Folder that holds provisional objects until their record is finalized.
pub const TEMP_UPLOAD_FOLDER: &str = "qb_temp_uploads";

/// Root folder for permanent, record-scoped objects.
pub const PERMANENT_FOLDER: &str = "qb_questions";

/// Tag attached to every provisional object.
pub const TEMP_UPLOAD_TAG: &str = "temp_upload";

/// Tag attached to every permanent object.
pub const PERMANENT_TAG: &str = "permanent";
