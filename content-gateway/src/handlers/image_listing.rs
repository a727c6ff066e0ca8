//! Paged listing of stored images.
//!
//! Keys come back in the order they were written. A page token is the
//! URL-safe base64 of `{position}:{key}` for the last entry of the previous
//! page. The next page starts at the first position after it, so removing that
//! entry does not strand the caller.

use super::image_generation::IMAGE_PREFIX;
use super::object_fetch::object_url;
use super::{parse_payload_or_default, RequestContext, WorkflowHandler};
use crate::dtos::{ListImagesRequest, ListImagesResponse, WorkflowResponse};
use crate::error::GatewayError;
use crate::services::metrics;
use crate::services::storage::{ListedObject, ObjectLister};
use async_trait::async_trait;
use axum::body::Bytes;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::sync::Arc;

fn encode_page_token(last: &ListedObject) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}:{}", last.position, last.key))
}

/// Position to resume after. The key part only pins the token to its prefix.
fn decode_page_token(token: &str, prefix: &str) -> Result<u64, GatewayError> {
    let invalid = || GatewayError::InvalidRequest("pageToken is not valid".to_string());

    let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
    let decoded = String::from_utf8(bytes).map_err(|_| invalid())?;
    let (position, key) = decoded.split_once(':').ok_or_else(invalid)?;
    let position: u64 = position.parse().map_err(|_| invalid())?;
    if !key.starts_with(prefix) {
        return Err(GatewayError::InvalidRequest(format!(
            "pageToken does not belong to prefix '{}'",
            prefix
        )));
    }
    Ok(position)
}

/// One page of `entries` past position `after`, plus the token for the next page.
fn paginate(
    entries: Vec<ListedObject>,
    after: Option<u64>,
    page_size: usize,
) -> (Vec<ListedObject>, Option<String>) {
    let mut page: Vec<ListedObject> = entries
        .into_iter()
        .filter(|entry| after.map_or(true, |last| entry.position > last))
        .take(page_size + 1)
        .collect();

    if page.len() > page_size {
        page.truncate(page_size);
        let token = page.last().map(encode_page_token);
        (page, token)
    } else {
        (page, None)
    }
}

pub struct ImageListingHandler {
    objects: Arc<dyn ObjectLister>,
    default_page_size: usize,
}

impl ImageListingHandler {
    pub fn new(objects: Arc<dyn ObjectLister>, default_page_size: usize) -> Self {
        Self {
            objects,
            default_page_size,
        }
    }
}

#[async_trait]
impl WorkflowHandler for ImageListingHandler {
    #[tracing::instrument(skip(self, body, ctx), fields(request_id = %ctx.request_id))]
    async fn handle(
        &self,
        body: Bytes,
        ctx: &RequestContext,
    ) -> Result<WorkflowResponse, GatewayError> {
        let req: ListImagesRequest = parse_payload_or_default(&body)?;

        let prefix = req.prefix.unwrap_or_else(|| IMAGE_PREFIX.to_string());
        let page_size = req
            .page_size
            .map(|s| s as usize)
            .unwrap_or(self.default_page_size);
        let after = req
            .page_token
            .as_deref()
            .map(|token| decode_page_token(token, &prefix))
            .transpose()?;

        let entries = self.objects.list(&prefix).await.map_err(|e| {
            metrics::record_storage_error("object_list");
            tracing::error!(prefix = %prefix, error = %e, "Failed to list objects");
            GatewayError::StorageUnavailable(e.to_string())
        })?;

        let (page, next_page_token) = paginate(entries, after, page_size);
        let keys: Vec<String> = page.into_iter().map(|entry| entry.key).collect();
        let urls = req
            .include_urls
            .then(|| keys.iter().map(|key| object_url(key)).collect());
        tracing::debug!(prefix = %prefix, count = keys.len(), "Listed images");

        Ok(WorkflowResponse::ImageList(ListImagesResponse {
            keys,
            urls,
            next_page_token,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{InMemoryObjectStore, LocalObjectStore, ObjectWriter};
    use std::time::Duration;
    use tokio::time::Instant;

    fn ctx() -> RequestContext {
        RequestContext {
            request_id: "req-1".to_string(),
            deadline: Instant::now() + Duration::from_secs(5),
        }
    }

    fn entries(n: u64) -> Vec<ListedObject> {
        (0..n)
            .map(|i| ListedObject {
                key: format!("images/{}.png", i),
                position: i,
            })
            .collect()
    }

    fn keys_of(page: &[ListedObject]) -> Vec<&str> {
        page.iter().map(|entry| entry.key.as_str()).collect()
    }

    async fn list_page(
        handler: &ImageListingHandler,
        request: serde_json::Value,
    ) -> ListImagesResponse {
        let body = Bytes::from(serde_json::to_vec(&request).unwrap());
        match handler.handle(body, &ctx()).await.unwrap() {
            WorkflowResponse::ImageList(list) => list,
            _ => panic!("unexpected response"),
        }
    }

    #[test]
    fn single_page_has_no_token() {
        let (page, token) = paginate(entries(3), None, 3);
        assert_eq!(page.len(), 3);
        assert!(token.is_none());
    }

    #[test]
    fn token_resumes_after_last_position() {
        let (first, token) = paginate(entries(5), None, 2);
        assert_eq!(keys_of(&first), vec!["images/0.png", "images/1.png"]);

        let after = decode_page_token(&token.unwrap(), "images/").unwrap();
        let (second, token) = paginate(entries(5), Some(after), 2);
        assert_eq!(keys_of(&second), vec!["images/2.png", "images/3.png"]);

        let after = decode_page_token(&token.unwrap(), "images/").unwrap();
        let (third, token) = paginate(entries(5), Some(after), 2);
        assert_eq!(keys_of(&third), vec!["images/4.png"]);
        assert!(token.is_none());
    }

    #[test]
    fn resumes_when_last_entry_is_gone() {
        let (first, token) = paginate(entries(4), None, 2);
        assert_eq!(keys_of(&first), vec!["images/0.png", "images/1.png"]);

        let remaining: Vec<_> = entries(4).into_iter().filter(|e| e.position != 1).collect();
        let after = decode_page_token(&token.unwrap(), "images/").unwrap();
        let (second, _) = paginate(remaining, Some(after), 2);
        assert_eq!(keys_of(&second), vec!["images/2.png", "images/3.png"]);
    }

    #[test]
    fn rejects_garbage_and_foreign_tokens() {
        assert!(decode_page_token("%%%", "images/").is_err());
        assert!(decode_page_token(&URL_SAFE_NO_PAD.encode("images/a.png"), "images/").is_err());
        assert!(decode_page_token(&URL_SAFE_NO_PAD.encode("x:images/a.png"), "images/").is_err());
        let foreign = encode_page_token(&ListedObject {
            key: "other/a.png".to_string(),
            position: 0,
        });
        assert!(decode_page_token(&foreign, "images/").is_err());
    }

    #[tokio::test]
    async fn lists_in_write_order_with_default_prefix() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.put("images/b.png", vec![1]).await.unwrap();
        store.put("uploads/x.jpg", vec![2]).await.unwrap();
        store.put("images/a.png", vec![3]).await.unwrap();
        let handler = ImageListingHandler::new(store, 1000);

        let response = handler.handle(Bytes::new(), &ctx()).await.unwrap();

        let WorkflowResponse::ImageList(list) = response else {
            panic!("unexpected response");
        };
        assert_eq!(list.keys, vec!["images/b.png", "images/a.png"]);
        assert!(list.urls.is_none());
        assert!(list.next_page_token.is_none());
    }

    #[tokio::test]
    async fn includes_fetch_urls_when_asked() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.put("images/a.png", vec![1]).await.unwrap();
        let handler = ImageListingHandler::new(store, 1000);

        let list = list_page(&handler, serde_json::json!({"includeUrls": true})).await;

        assert_eq!(list.urls, Some(vec!["/objects/images/a.png".to_string()]));
    }

    #[tokio::test]
    async fn token_survives_removal_from_local_store() {
        let path = std::env::temp_dir().join(format!("content-gateway-test-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(LocalObjectStore::new(&path).await.unwrap());
        for key in ["images/a.png", "images/b.png", "images/c.png"] {
            store.put(key, vec![1]).await.unwrap();
        }
        let handler = ImageListingHandler::new(store, 1000);

        let first = list_page(&handler, serde_json::json!({"pageSize": 1})).await;
        assert_eq!(first.keys, vec!["images/a.png"]);

        tokio::fs::remove_file(path.join("images/a.png")).await.unwrap();

        let second = list_page(
            &handler,
            serde_json::json!({"pageSize": 1, "pageToken": first.next_page_token.unwrap()}),
        )
        .await;
        assert_eq!(second.keys, vec!["images/b.png"]);
        assert!(second.next_page_token.is_some());

        let _ = tokio::fs::remove_dir_all(&path).await;
    }

    #[tokio::test]
    async fn page_size_out_of_range_is_invalid() {
        let handler = ImageListingHandler::new(Arc::new(InMemoryObjectStore::new()), 1000);

        let err = handler
            .handle(Bytes::from_static(br#"{"pageSize": 0}"#), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
    }
}
