//! Storage backend trait.

use async_trait::async_trait;
use riskwatch_core::Result;

/// Result of a conditional create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The object did not exist and has been written.
    Created,
    /// An object already exists at the key; nothing was written.
    Exists,
    /// The backend cannot create conditionally; nothing was written.
    Unsupported,
}

/// Key/value object store.
///
/// Keys are `/`-separated paths such as `daily/2025-03-01/runs/000.json`.
/// `list` may be eventually consistent.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write `bytes` at `key`, overwriting any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Read the object at `key`. Returns None if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// List every key starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Write `bytes` at `key` only if nothing is stored there yet.
    async fn create_new(&self, _key: &str, _bytes: Vec<u8>) -> Result<CreateOutcome> {
        Ok(CreateOutcome::Unsupported)
    }

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
