//! Filesystem object store.
//!
//! Objects live at `{base_path}/{key}`. Writes go to a hidden temporary file
//! that is renamed into place, then the key is appended to a journal. Listing
//! reads the journal, so keys come back in write order and never before their
//! object is complete. A key's position is the journal line of its first write.

use super::{
    validate_key, ListedObject, ObjectLister, ObjectReader, ObjectWriter, StoreError,
    StoreHealth,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

const JOURNAL_FILE: &str = ".keys.journal";

pub struct LocalObjectStore {
    base_path: PathBuf,
    journal_lock: Mutex<()>,
}

impl LocalObjectStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self {
            base_path,
            journal_lock: Mutex::new(()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    async fn record_key(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.journal_lock.lock().await;
        let mut journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.base_path.join(JOURNAL_FILE))
            .await?;
        journal.write_all(format!("{}\n", key).as_bytes()).await?;
        journal.sync_data().await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectReader for LocalObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(key)?;
        match fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ObjectWriter for LocalObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent).await?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        let staging = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        let written = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&staging, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        // An object missing from the journal could never be listed.
        if let Err(e) = self.record_key(key).await {
            tracing::warn!(key = %key, error = %e, "Journal append failed, removing object");
            let _ = fs::remove_file(&path).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectLister for LocalObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>, StoreError> {
        let journal = match fs::read_to_string(self.base_path.join(JOURNAL_FILE)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut seen = HashSet::new();
        let mut listed = Vec::new();
        for (position, key) in journal.lines().enumerate() {
            if key.is_empty() || !key.starts_with(prefix) || !seen.insert(key) {
                continue;
            }
            // Objects removed outside the gateway must not be listed.
            if fs::try_exists(self.base_path.join(key)).await? {
                listed.push(ListedObject {
                    key: key.to_string(),
                    position: position as u64,
                });
            }
        }
        Ok(listed)
    }
}

#[async_trait]
impl StoreHealth for LocalObjectStore {
    fn name(&self) -> &'static str {
        "object_store"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let metadata = fs::metadata(&self.base_path).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Io(std::io::Error::other(format!(
                "{} is not a directory",
                self.base_path.display()
            ))))
        }
    }
}
