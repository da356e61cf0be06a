//! Riskwatch Store: key/value storage backends and the run archive.
//!
//! Provides the `StorageBackend` trait over `put`/`get`/`list`.
//! `FsBackend` stores objects as files under a data directory,
//! `RemoteBackend` talks to an HTTP blob store, and `MemoryBackend`
//! keeps everything in process for tests and dry runs.

pub mod archive;
pub mod backend;
pub mod fs;
pub mod keys;
pub mod memory;
pub mod remote;

pub use archive::{RunArchive, RunListing};
pub use backend::{CreateOutcome, StorageBackend};
pub use fs::FsBackend;
pub use memory::MemoryBackend;
pub use remote::RemoteBackend;

use std::sync::Arc;

use riskwatch_core::{Result, StorageConfig};

/// Create the storage backend selected by configuration.
pub fn create_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::Local { root } => {
            tracing::info!("Using filesystem storage at {}", root.display());
            Ok(Arc::new(FsBackend::new(root)))
        }
        StorageConfig::Remote { base_url, token } => {
            tracing::info!("Using remote blob storage at {}", base_url);
            Ok(Arc::new(RemoteBackend::new(base_url, token.clone())?))
        }
    }
}
