//! MongoDB-backed record store for description feedback.

use crate::models::FeedbackRecord;
use crate::services::storage::{RecordAppender, RecordQuery, StoreError, StoreHealth};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct FeedbackDb {
    db: Database,
    collection: String,
}

impl FeedbackDb {
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, collection = %collection, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self {
            db,
            collection: collection.to_string(),
        })
    }

    /// The (user_id, timestamp) pair is the record key, so it is unique.
    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        let key_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "timestamp": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_timestamp_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.feedback()
            .create_index(key_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create user_timestamp index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("Successfully created feedback indexes");
        Ok(())
    }

    pub fn feedback(&self) -> Collection<FeedbackRecord> {
        self.db.collection(&self.collection)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl RecordAppender for FeedbackDb {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), StoreError> {
        self.feedback()
            .insert_one(record, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::DuplicateRecord(record.user_id.clone(), record.timestamp.clone())
                } else {
                    tracing::error!("Failed to insert feedback record: {}", e);
                    StoreError::Database(e.to_string())
                }
            })?;
        Ok(())
    }
}

#[async_trait]
impl RecordQuery for FeedbackDb {
    async fn query(&self, user_id: &str) -> Result<Vec<FeedbackRecord>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "timestamp": 1 }).build();
        let cursor = self
            .feedback()
            .find(doc! { "user_id": user_id }, options)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl StoreHealth for FeedbackDb {
    fn name(&self) -> &'static str {
        "record_store"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
