use bytes::Bytes;
use qbank_core::UploadConfig;
use qbank_storage::ProvisionalFile;

/// A file as received from the client, before validation
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Reasons a single file is rejected
#[derive(Debug, thiserror::Error)]
pub enum FileValidationError {
    #[error("File is empty")]
    EmptyFile,

    #[error("File size exceeds {max_mb}MB limit")]
    FileTooLarge { size: usize, max_mb: usize },

    #[error("Unsupported file type: {detected}. Allowed types: {allowed}")]
    UnsupportedType { detected: String, allowed: String },
}

/// Content type from leading magic bytes, `None` when unrecognized.
pub fn detect_content_type(data: &[u8]) -> Option<&'static str> {
    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }

    // GIF87a / GIF89a
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    None
}

/// Size and sniffed-type checks applied to every file before any upload starts
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_file_size: usize,
    allowed_content_types: Vec<String>,
}

impl FileValidator {
    pub fn new(max_file_size: usize, allowed_content_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_file_size_bytes,
            config.allowed_content_types.clone(),
        )
    }

    /// Validate `file` and return the content type it was sniffed as.
    pub fn validate(&self, file: &IncomingFile) -> Result<&'static str, FileValidationError> {
        let size = file.data.len();
        if size == 0 {
            return Err(FileValidationError::EmptyFile);
        }
        if size > self.max_file_size {
            return Err(FileValidationError::FileTooLarge {
                size,
                max_mb: self.max_file_size / (1024 * 1024),
            });
        }

        match detect_content_type(&file.data) {
            Some(content_type) if self.allows(content_type) => Ok(content_type),
            detected => Err(FileValidationError::UnsupportedType {
                detected: detected.unwrap_or("application/octet-stream").to_string(),
                allowed: self.allowed_content_types.join(", "),
            }),
        }
    }

    /// Validate and convert into the value handed to the media backend.
    pub fn prepare(&self, file: IncomingFile) -> Result<ProvisionalFile, FileValidationError> {
        let content_type = self.validate(&file)?;
        Ok(ProvisionalFile::new(file.filename, content_type, file.data))
    }

    fn allows(&self, content_type: &str) -> bool {
        self.allowed_content_types.iter().any(|t| t == content_type)
    }
}
