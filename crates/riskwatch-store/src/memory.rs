//! In-process backend for tests and dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use riskwatch_core::{Error, Result};

use crate::backend::{CreateOutcome, StorageBackend};

/// Thread-safe map-backed store.
#[derive(Default)]
pub struct MemoryBackend {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_writes: Mutex<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Remove an object, simulating a lost or lagging entry.
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().remove(key)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if *self.fail_writes.lock() {
            return Err(Error::Storage(format!("write '{}': backend unavailable", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.check_writable(key)?;
        self.objects.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn create_new(&self, key: &str, bytes: Vec<u8>) -> Result<CreateOutcome> {
        self.check_writable(key)?;
        let mut objects = self.objects.lock();
        if objects.contains_key(key) {
            return Ok(CreateOutcome::Exists);
        }
        objects.insert(key.to_string(), bytes);
        Ok(CreateOutcome::Created)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
