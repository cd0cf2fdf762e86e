use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::ObjectStore;
use crate::error::StorageError;

/// Object store rooted at a local directory.
///
/// Keys look like `<prefix>/<uuid>.<ext>` and map onto paths below the root.
pub struct FilesystemStore {
    root: PathBuf,
    key_prefix: String,
}

impl FilesystemStore {
    pub fn new<P: AsRef<Path>>(root: P, key_prefix: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            key_prefix: key_prefix.trim_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Resolves a key to its on-disk path, rejecting anything that would escape the root.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::ReadObject { path, source: e })
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::ReadObject { path, source: e })
    }

    fn new_key(&self, extension: &str) -> String {
        let name = format!("{}.{}", Uuid::new_v4(), extension);
        if self.key_prefix.is_empty() {
            name
        } else {
            format!("{}/{}", self.key_prefix, name)
        }
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<String, StorageError> {
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidKey(format!("*.{}", extension)));
        }

        let key = self.new_key(extension);
        let path = self.path_for(&key)?;
        if let Some(parent) = path.parent() {
            self.ensure_directory(parent).await?;
        }

        // create_new fails if the object is already there; keys are never overwritten.
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::ObjectExists(key));
            }
            Err(e) => return Err(StorageError::WriteObject { path, source: e }),
        };

        file.write_all(bytes)
            .await
            .map_err(|e| StorageError::WriteObject {
                path: path.clone(),
                source: e,
            })?;
        file.flush()
            .await
            .map_err(|e| StorageError::WriteObject { path, source: e })?;

        tracing::debug!(key = %key, size = bytes.len(), "Stored image object");
        Ok(key)
    }

    async fn health_check(&self) -> Result<(), String> {
        self.ensure_directory(&self.root)
            .await
            .map_err(|e| e.to_string())
    }
}
