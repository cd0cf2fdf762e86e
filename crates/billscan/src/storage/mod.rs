pub mod filesystem;

use async_trait::async_trait;

use crate::error::StorageError;

pub use filesystem::FilesystemStore;

/// Durable storage for submitted image bytes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` and returns the key they can be found under.
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<String, StorageError>;

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
