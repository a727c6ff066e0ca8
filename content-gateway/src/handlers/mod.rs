//! Workflow handlers.
//!
//! Each handler owns one workflow end to end (validate, invoke, persist,
//! respond) and is built with only the storage capabilities it is granted.
//! Handlers never call one another.

pub mod article;
pub mod description;
pub mod image_generation;
pub mod image_listing;
pub mod object_fetch;

pub use article::ArticleHandler;
pub use description::DescriptionHandler;
pub use image_generation::ImageGenerationHandler;
pub use image_listing::ImageListingHandler;
pub use object_fetch::ObjectFetcher;

use crate::dtos::WorkflowResponse;
use crate::error::GatewayError;
use async_trait::async_trait;
use axum::body::Bytes;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use validator::Validate;

/// Per-request data handed from the router to a handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Route deadline; model calls are abandoned at this instant.
    pub deadline: Instant,
}

#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn handle(
        &self,
        body: Bytes,
        ctx: &RequestContext,
    ) -> Result<WorkflowResponse, GatewayError>;
}

/// Deserialize and validate a JSON body.
pub(crate) fn parse_payload<T>(body: &[u8]) -> Result<T, GatewayError>
where
    T: DeserializeOwned + Validate,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(GatewayError::InvalidRequest(
            "request body is empty".to_string(),
        ));
    }

    let payload: T = serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed JSON payload: {}", e)))?;
    payload.validate()?;
    Ok(payload)
}

/// Like [`parse_payload`], but an empty body yields `T::default()`.
pub(crate) fn parse_payload_or_default<T>(body: &[u8]) -> Result<T, GatewayError>
where
    T: DeserializeOwned + Validate + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_payload(body)
}

/// MIME type from the leading magic bytes.
pub(crate) fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
