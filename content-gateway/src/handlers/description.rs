//! Image description workflow.
//!
//! Reads the referenced image, asks the text model for a social-media title
//! and description, and appends a feedback record before answering.

use super::{parse_payload, sniff_image_type, RequestContext, WorkflowHandler};
use crate::dtos::{DescriptionRequest, DescriptionResponse, GenerationMetadata, WorkflowResponse};
use crate::error::GatewayError;
use crate::models::FeedbackRecord;
use crate::services::clock::MonotonicClock;
use crate::services::metrics;
use crate::services::providers::{
    GenerationParams, InlineImage, ModelInvoker, ModelKind, ModelRequest,
};
use crate::services::storage::{ObjectReader, RecordAppender, StoreError};
use async_trait::async_trait;
use axum::body::Bytes;
use std::sync::Arc;

const DEFAULT_TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptType {
    Story,
    Post,
}

impl PromptType {
    fn parse(value: Option<&str>) -> Result<Self, GatewayError> {
        match value.map(str::trim) {
            None | Some("") | Some("Instagram Post") => Ok(PromptType::Post),
            Some("Instagram Story") => Ok(PromptType::Story),
            Some(other) => Err(GatewayError::InvalidRequest(format!(
                "unknown promptType '{}', expected 'Instagram Story' or 'Instagram Post'",
                other
            ))),
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            PromptType::Story => "story",
            PromptType::Post => "post",
        }
    }
}

/// The part of `promptType` after the platform name, lowercased. `Instagram Reel`
/// becomes `reel`.
fn format_noun(prompt_type: Option<&str>) -> String {
    let value = prompt_type.map(str::trim).unwrap_or_default();
    let lowered = value.to_lowercase();
    let noun = lowered.strip_prefix("instagram").unwrap_or(&lowered).trim();
    if noun.is_empty() {
        PromptType::Post.noun().to_string()
    } else {
        noun.to_string()
    }
}

/// A custom template wins outright, then a user description with any
/// `promptType`. Only the built-in templates require a known `promptType`.
fn build_prompt(
    prompt_type: Option<&str>,
    custom_template: Option<&str>,
    user_description: Option<&str>,
) -> Result<String, GatewayError> {
    if let Some(template) = custom_template.filter(|t| !t.trim().is_empty()) {
        return Ok(template.to_string());
    }

    if let Some(hint) = user_description.filter(|d| !d.trim().is_empty()) {
        return Ok(format!(
            "I will provide an image and a brief description provided by the user. \
             Generate a catchy title and a brief description suitable for an Instagram {}.\n\
             User Description: {}\n\
             Answer in this format:\n\
             Title: <title>\n\
             Description: <description>",
            format_noun(prompt_type),
            hint.trim()
        ));
    }

    let prompt = match PromptType::parse(prompt_type)? {
        PromptType::Story => "I will provide an image. Generate a catchy title and a very brief \
             description suitable for an Instagram story.\n\
             Answer in this format:\n\
             Title: Sweet Moments\n\
             Description: Perfect day for a treat! #IceCreamDay #SunnyVibes",
        PromptType::Post => "I will provide an image. Generate a catchy title and a brief \
             description suitable for an Instagram post.\n\
             Answer in this format:\n\
             Title: Urban Exploration\n\
             Description: Discovering the hidden gems of the city, one mural at a time. \
             #CityLife #StreetArt",
    };
    Ok(prompt.to_string())
}

fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches('"').trim()
}

/// Pull `Title:` and `Description:` lines out of the model output. Without a
/// `Description:` line the whole output is the description.
fn parse_model_output(output: &str) -> (Option<String>, String) {
    let mut title = None;
    let mut description = None;

    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Title:") {
            let value = strip_quotes(rest);
            if !value.is_empty() {
                title = Some(value.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("Description:") {
            let value = strip_quotes(rest);
            if !value.is_empty() {
                description = Some(value.to_string());
            }
        }
    }

    let description = description.unwrap_or_else(|| output.trim().to_string());
    (title, description)
}

pub struct DescriptionHandler {
    objects: Arc<dyn ObjectReader>,
    records: Arc<dyn RecordAppender>,
    models: Arc<ModelInvoker>,
    clock: Arc<MonotonicClock>,
}

impl DescriptionHandler {
    pub fn new(
        objects: Arc<dyn ObjectReader>,
        records: Arc<dyn RecordAppender>,
        models: Arc<ModelInvoker>,
        clock: Arc<MonotonicClock>,
    ) -> Self {
        Self {
            objects,
            records,
            models,
            clock,
        }
    }

    async fn read_image(&self, key: &str) -> Result<InlineImage, GatewayError> {
        let bytes = match self.objects.get(key).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => {
                return Err(GatewayError::InvalidRequest(format!(
                    "image '{}' does not exist",
                    key
                )))
            }
            Err(StoreError::InvalidKey(_)) => {
                return Err(GatewayError::InvalidRequest(format!(
                    "'{}' is not a valid image reference",
                    key
                )))
            }
            Err(e) => {
                metrics::record_storage_error("object_get");
                tracing::error!(image_ref = %key, error = %e, "Failed to read source image");
                return Err(GatewayError::StorageUnavailable(e.to_string()));
            }
        };

        let mime_type = sniff_image_type(&bytes).ok_or_else(|| {
            GatewayError::InvalidRequest(format!("'{}' is not a PNG, JPEG, GIF or WebP image", key))
        })?;

        Ok(InlineImage {
            mime_type: mime_type.to_string(),
            data: bytes,
        })
    }
}

#[async_trait]
impl WorkflowHandler for DescriptionHandler {
    #[tracing::instrument(
        skip(self, body, ctx),
        fields(request_id = %ctx.request_id, user_id = tracing::field::Empty)
    )]
    async fn handle(
        &self,
        body: Bytes,
        ctx: &RequestContext,
    ) -> Result<WorkflowResponse, GatewayError> {
        let req: DescriptionRequest = parse_payload(&body)?;
        tracing::Span::current().record("user_id", req.user_id.as_str());

        let prompt = build_prompt(
            req.prompt_type.as_deref(),
            req.custom_template.as_deref(),
            req.user_description.as_deref(),
        )?;

        let image = self.read_image(&req.image_ref).await?;

        let model_request = ModelRequest::new(prompt)
            .with_image(image)
            .with_params(GenerationParams {
                temperature: Some(req.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
                max_tokens: Some(MAX_TOKENS),
                ..Default::default()
            });

        let output = self
            .models
            .invoke(ModelKind::Text, &model_request, ctx.deadline)
            .await?
            .into_text()?;
        let (title, description) = parse_model_output(&output);

        let model = self.models.model_id(ModelKind::Text).to_string();
        let timestamp = self.clock.now_sort_key();
        let record = FeedbackRecord::accepted(
            req.user_id.as_str(),
            timestamp.as_str(),
            req.image_ref.as_str(),
            description.as_str(),
            req.user_description.clone(),
            model.as_str(),
        );

        if let Err(e) = self.records.append(&record).await {
            metrics::record_storage_error("record_append");
            tracing::error!(error = %e, timestamp = %timestamp, "Failed to store feedback record");
            return Err(GatewayError::PersistenceFailed(e.to_string()));
        }

        tracing::info!(timestamp = %timestamp, "Description generated");

        Ok(WorkflowResponse::Description(DescriptionResponse {
            description,
            title,
            metadata: GenerationMetadata { model, timestamp },
        }))
    }
}
