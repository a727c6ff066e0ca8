//! Read-only retrieval of stored objects, served at `GET /objects/{key}`.

use super::sniff_image_type;
use crate::error::GatewayError;
use crate::services::metrics;
use crate::services::storage::{ObjectReader, StoreError};
use std::sync::Arc;
use tokio::time::Instant;

/// Path prefix of the object route.
pub const OBJECT_ROUTE: &str = "/objects";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// `GET` path for `key`, with each segment percent-encoded.
pub fn object_url(key: &str) -> String {
    let segments: Vec<_> = key.split('/').map(urlencoding::encode).collect();
    format!("{}/{}", OBJECT_ROUTE, segments.join("/"))
}

#[derive(Debug)]
pub struct StoredObject {
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

pub struct ObjectFetcher {
    objects: Arc<dyn ObjectReader>,
}

impl ObjectFetcher {
    pub fn new(objects: Arc<dyn ObjectReader>) -> Self {
        Self { objects }
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, key: &str) -> Result<StoredObject, GatewayError> {
        let started = Instant::now();
        let result = match self.objects.get(key).await {
            Ok(data) => Ok(StoredObject {
                content_type: sniff_image_type(&data).unwrap_or(FALLBACK_CONTENT_TYPE),
                data,
            }),
            Err(StoreError::NotFound(_)) => Err(GatewayError::ObjectNotFound(key.to_string())),
            Err(StoreError::InvalidKey(_)) => Err(GatewayError::InvalidRequest(format!(
                "'{}' is not a valid object key",
                key
            ))),
            Err(e) => {
                metrics::record_storage_error("object_get");
                tracing::error!(error = %e, "Failed to read object");
                Err(GatewayError::StorageUnavailable(e.to_string()))
            }
        };

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.status_code().as_u16(),
        };
        metrics::record_request("objects", status, started.elapsed().as_secs_f64());
        result
    }
}
