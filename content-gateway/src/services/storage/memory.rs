//! In-process store backends for development and tests.

use super::{
    validate_key, ListedObject, ObjectLister, ObjectReader, ObjectWriter, RecordAppender,
    RecordQuery, StoreError, StoreHealth,
};
use crate::models::FeedbackRecord;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Objects {
    /// Keys in first-write order.
    order: Vec<String>,
    data: HashMap<String, Vec<u8>>,
}

/// Object store held in memory. Overwriting a key keeps its listing position.
#[derive(Default)]
pub struct InMemoryObjectStore {
    inner: RwLock<Objects>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ObjectReader for InMemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner
            .read()
            .await
            .data
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl ObjectWriter for InMemoryObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut objects = self.inner.write().await;
        if objects.data.insert(key.to_string(), data).is_none() {
            objects.order.push(key.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectLister for InMemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .order
            .iter()
            .enumerate()
            .filter(|(_, key)| key.starts_with(prefix))
            .map(|(position, key)| ListedObject {
                key: key.clone(),
                position: position as u64,
            })
            .collect())
    }
}

#[async_trait]
impl StoreHealth for InMemoryObjectStore {
    fn name(&self) -> &'static str {
        "object_store"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Record store held in memory, partitioned by user id and sorted by timestamp.
#[derive(Default)]
pub struct InMemoryRecordStore {
    partitions: RwLock<HashMap<String, BTreeMap<String, FeedbackRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all partitions.
    pub async fn len(&self) -> usize {
        self.partitions.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordAppender for InMemoryRecordStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), StoreError> {
        let mut partitions = self.partitions.write().await;
        let partition = partitions.entry(record.user_id.clone()).or_default();
        if partition.contains_key(&record.timestamp) {
            return Err(StoreError::DuplicateRecord(
                record.user_id.clone(),
                record.timestamp.clone(),
            ));
        }
        partition.insert(record.timestamp.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl RecordQuery for InMemoryRecordStore {
    async fn query(&self, user_id: &str) -> Result<Vec<FeedbackRecord>, StoreError> {
        Ok(self
            .partitions
            .read()
            .await
            .get(user_id)
            .map(|partition| partition.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl StoreHealth for InMemoryRecordStore {
    fn name(&self) -> &'static str {
        "record_store"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
