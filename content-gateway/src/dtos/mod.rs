//! Request and response bodies of the four workflows.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRequest {
    /// Object key of the image to describe.
    #[validate(
        length(min = 1, max = 1024, message = "imageRef must be 1-1024 characters"),
        custom(function = "not_blank")
    )]
    pub image_ref: String,
    #[validate(
        length(min = 1, max = 256, message = "userId must be 1-256 characters"),
        custom(function = "not_blank")
    )]
    pub user_id: String,
    /// `Instagram Story` or `Instagram Post` for the built-in prompts. Any
    /// value is accepted alongside `customTemplate` or `userDescription`.
    pub prompt_type: Option<String>,
    /// Replaces the built-in prompt entirely.
    #[validate(length(max = 4096, message = "customTemplate must be at most 4096 characters"))]
    pub custom_template: Option<String>,
    /// The user's own short description, folded into the prompt.
    #[validate(length(max = 4096, message = "userDescription must be at most 4096 characters"))]
    pub user_description: Option<String>,
    #[validate(range(min = 0.0, max = 1.0, message = "temperature must be between 0 and 1"))]
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRequest {
    #[serde(alias = "content")]
    #[validate(
        length(min = 1, max = 100000, message = "text must be 1-100000 characters"),
        custom(function = "not_blank")
    )]
    pub text: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    #[validate(
        length(min = 1, max = 2000, message = "prompt must be 1-2000 characters"),
        custom(function = "not_blank")
    )]
    pub prompt: String,
    #[validate(range(min = 0.0, max = 35.0, message = "cfgScale must be between 0 and 35"))]
    pub cfg_scale: Option<f32>,
    #[validate(range(min = 10, max = 150, message = "steps must be between 10 and 150"))]
    pub steps: Option<u32>,
    pub seed: Option<u32>,
    #[validate(range(min = 512, max = 1536, message = "width must be between 512 and 1536"))]
    pub width: Option<u32>,
    #[validate(range(min = 512, max = 1536, message = "height must be between 512 and 1536"))]
    pub height: Option<u32>,
    /// Include the generated bytes (base64) in the response.
    #[serde(default)]
    pub return_image: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListImagesRequest {
    #[validate(length(max = 1024, message = "prefix must be at most 1024 characters"))]
    pub prefix: Option<String>,
    #[validate(length(min = 1, max = 2048, message = "pageToken must be 1-2048 characters"))]
    pub page_token: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "pageSize must be between 1 and 1000"))]
    pub page_size: Option<u32>,
    /// Add a fetch URL for every listed key.
    #[serde(default)]
    pub include_urls: bool,
}

/// Which model produced a result, and when.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub model: String,
    /// ISO-8601 UTC.
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionResponse {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub metadata: GenerationMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub title: String,
    /// First entry of `subtitles`, or empty.
    pub subtitle: String,
    pub subtitles: Vec<String>,
    #[serde(flatten)]
    pub metadata: GenerationMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(flatten)]
    pub metadata: GenerationMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImagesResponse {
    pub keys: Vec<String>,
    /// `GET` paths for `keys`, in the same order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// What a workflow hands back to the router for serialization.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WorkflowResponse {
    Description(DescriptionResponse),
    Article(ArticleResponse),
    Image(ImageResponse),
    ImageList(ListImagesResponse),
}
