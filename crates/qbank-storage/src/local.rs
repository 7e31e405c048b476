use crate::keys;
use crate::traits::{
    MediaBackend, PermanentTarget, ProvisionalFile, StorageError, StorageResult, StoredObject,
};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem media backend
///
/// Objects live at `{base_path}/{object_id}`; their tags are kept next to them in a
/// `{object_id}.tags` file, one tag per line.
#[derive(Clone)]
pub struct LocalMediaBackend {
    base_path: PathBuf,
    base_url: String,
}

impl LocalMediaBackend {
    /// Create a new LocalMediaBackend instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for stored media (e.g., "./data/media")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:4000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalMediaBackend {
            base_path,
            base_url,
        })
    }

    /// Convert an object ID to a filesystem path, rejecting IDs that could escape
    /// the base directory.
    fn object_path(&self, object_id: &str) -> StorageResult<PathBuf> {
        if object_id.is_empty() || object_id.contains("..") || object_id.starts_with('/') {
            return Err(StorageError::InvalidKey(format!(
                "Object id '{}' contains invalid characters",
                object_id
            )));
        }

        let path = self.base_path.join(object_id);
        if !path.starts_with(&self.base_path) {
            return Err(StorageError::InvalidKey(
                "Object id resolves outside storage directory".to_string(),
            ));
        }
        Ok(path)
    }

    fn tags_path(path: &Path) -> PathBuf {
        let mut raw = OsString::from(path.as_os_str());
        raw.push(".tags");
        PathBuf::from(raw)
    }

    fn object_url(&self, object_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), object_id)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_object(&self, path: &Path, data: &[u8], tags: &[String]) -> StorageResult<()> {
        self.ensure_parent_dir(path).await?;

        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        file.write_all(data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        fs::write(Self::tags_path(path), tags.join("\n")).await?;
        Ok(())
    }

    /// Whether an object with this ID is stored
    pub async fn exists(&self, object_id: &str) -> StorageResult<bool> {
        let path = self.object_path(object_id)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Tags recorded for an object
    pub async fn tags(&self, object_id: &str) -> StorageResult<Vec<String>> {
        let path = self.object_path(object_id)?;
        match fs::read_to_string(Self::tags_path(&path)).await {
            Ok(raw) => Ok(raw.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(object_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Raw bytes of an object
    pub async fn read(&self, object_id: &str) -> StorageResult<Vec<u8>> {
        let path = self.object_path(object_id)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(object_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MediaBackend for LocalMediaBackend {
    async fn upload(
        &self,
        file: ProvisionalFile,
        folder: &str,
        tags: &[String],
    ) -> StorageResult<StoredObject> {
        let object_id = keys::provisional_object_id(folder);
        let path = self.object_path(&object_id)?;
        let start = std::time::Instant::now();

        self.write_object(&path, &file.data, tags).await?;

        tracing::info!(
            object_id = %object_id,
            filename = %file.filename,
            content_type = %file.content_type,
            size_bytes = file.size(),
            tags = ?tags,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local media upload successful"
        );

        Ok(StoredObject {
            url: self.object_url(&object_id),
            object_id,
        })
    }

    async fn move_to_permanent(
        &self,
        object_id: &str,
        target: &PermanentTarget,
    ) -> StorageResult<String> {
        let from_path = self.object_path(object_id)?;
        let to_path = self.object_path(&target.object_id)?;
        let start = std::time::Instant::now();

        let data = match fs::read(&from_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(object_id.to_string()));
            }
            Err(e) => {
                return Err(StorageError::MoveFailed(format!(
                    "Failed to read {}: {}",
                    from_path.display(),
                    e
                )));
            }
        };

        self.write_object(&to_path, &data, &target.tags)
            .await
            .map_err(|e| StorageError::MoveFailed(e.to_string()))?;

        if let Err(e) = self.delete(object_id).await {
            tracing::warn!(
                object_id = %object_id,
                error = %e,
                "Failed to delete provisional object after move"
            );
        }

        tracing::info!(
            from = %object_id,
            to = %target.object_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local media move successful"
        );

        Ok(self.object_url(&target.object_id))
    }

    async fn delete(&self, object_id: &str) -> StorageResult<()> {
        let path = self.object_path(object_id)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;
        let _ = fs::remove_file(Self::tags_path(&path)).await;

        tracing::debug!(object_id = %object_id, "Local media delete successful");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
