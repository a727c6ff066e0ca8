//! Capability-scoped access to the object store and the record store.
//!
//! Every operation is its own trait. A workflow handler is constructed with
//! exactly the traits it is granted, so an operation outside that grant cannot
//! be expressed. Backends implement all of them and are split into handles by
//! [`ObjectCapabilities`] and [`RecordCapabilities`] at startup.

pub mod local;
pub mod memory;

pub use local::LocalObjectStore;
pub use memory::{InMemoryObjectStore, InMemoryRecordStore};

use crate::models::FeedbackRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Record already exists for key ({0}, {1})")]
    DuplicateRecord(String, String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),
}

/// Read an object by key.
#[async_trait]
pub trait ObjectReader: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}

/// Write an object. Returns only once the object is durable and readable.
#[async_trait]
pub trait ObjectWriter: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError>;
}

/// A listed key and its position in write order. Removing an object never
/// renumbers the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub position: u64,
}

/// List keys under a prefix, in the order they were first written.
///
/// Only keys whose writes have completed are returned. Positions increase
/// along the returned list.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>, StoreError>;
}

/// Append an immutable record. Fails if its key already exists.
#[async_trait]
pub trait RecordAppender: Send + Sync {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), StoreError>;
}

/// All records in one partition, ordered by sort key ascending.
#[async_trait]
pub trait RecordQuery: Send + Sync {
    async fn query(&self, user_id: &str) -> Result<Vec<FeedbackRecord>, StoreError>;
}

/// Backend liveness, used by the readiness check.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    fn name(&self) -> &'static str;
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Handles onto one object store backend, one per operation.
#[derive(Clone)]
pub struct ObjectCapabilities {
    pub reader: Arc<dyn ObjectReader>,
    pub writer: Arc<dyn ObjectWriter>,
    pub lister: Arc<dyn ObjectLister>,
    pub health: Arc<dyn StoreHealth>,
}

impl ObjectCapabilities {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ObjectReader + ObjectWriter + ObjectLister + StoreHealth + 'static,
    {
        Self {
            reader: store.clone(),
            writer: store.clone(),
            lister: store.clone(),
            health: store,
        }
    }
}

/// Handles onto one record store backend, one per operation.
#[derive(Clone)]
pub struct RecordCapabilities {
    pub appender: Arc<dyn RecordAppender>,
    pub query: Arc<dyn RecordQuery>,
    pub health: Arc<dyn StoreHealth>,
}

impl RecordCapabilities {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: RecordAppender + RecordQuery + StoreHealth + 'static,
    {
        Self {
            appender: store.clone(),
            query: store.clone(),
            health: store,
        }
    }
}

/// Rejects keys that could escape a key space rooted at a directory.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let well_formed = !key.is_empty()
        && !key.starts_with('/')
        && !key.ends_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && !segment.starts_with('.'));

    if well_formed {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
