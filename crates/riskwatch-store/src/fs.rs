//! Local filesystem backend.
//!
//! Each key maps to a file under the root directory. Writes go through a
//! hidden temp file so readers never observe a half-written object.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use riskwatch_core::{Error, Result};
use tracing::debug;

use crate::backend::{CreateOutcome, StorageBackend};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(Error::Storage(format!("invalid key '{}'", key)));
        }
        Ok(self.root.join(key))
    }

    /// Write `bytes` to a hidden sibling of `path` and return the temp path.
    async fn write_temp(&self, key: &str, path: &Path, bytes: &[u8]) -> Result<PathBuf> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Storage(format!("key '{}' has no parent", key)))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| storage_err("create dir for", key, e))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("object");
        let tmp = parent.join(format!(
            ".{}.{}-{}.tmp",
            file_name,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| storage_err("write", key, e))?;
        Ok(tmp)
    }
}

fn storage_err(op: &str, key: &str, e: std::io::Error) -> Error {
    Error::Storage(format!("{} '{}': {}", op, key, e))
}

#[async_trait]
impl StorageBackend for FsBackend {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = self.write_temp(key, &path, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_err("rename into", key, e));
        }
        debug!("fs put {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err("read", key, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // Walk from the deepest directory the prefix names, then filter.
        let dir_part = match prefix.rfind('/') {
            Some(pos) => &prefix[..pos],
            None => "",
        };
        let start = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.path_for(dir_part)?
        };

        let mut keys = Vec::new();
        let mut pending = vec![(start, dir_part.to_string())];
        while let Some((dir, rel)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(storage_err("list", prefix, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| storage_err("list", prefix, e))?
            {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }
                let key = if rel.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel, name)
                };
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| storage_err("stat", &key, e))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), key));
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn create_new(&self, key: &str, bytes: Vec<u8>) -> Result<CreateOutcome> {
        let path = self.path_for(key)?;
        let tmp = self.write_temp(key, &path, &bytes).await?;
        // hard_link refuses to replace an existing file, which makes the publish atomic.
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(CreateOutcome::Created),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(CreateOutcome::Exists),
            Err(e) => Err(storage_err("create", key, e)),
        }
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}
