//! Text-to-image workflow. The generated image is written to the object store
//! before its key is returned.

use super::{parse_payload, RequestContext, WorkflowHandler};
use crate::dtos::{GenerationMetadata, ImageRequest, ImageResponse, WorkflowResponse};
use crate::error::GatewayError;
use crate::services::clock::format_sort_key;
use crate::services::metrics;
use crate::services::providers::{GenerationParams, ModelInvoker, ModelKind, ModelRequest};
use crate::services::storage::ObjectWriter;
use async_trait::async_trait;
use axum::body::Bytes;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub const IMAGE_PREFIX: &str = "images/";

const DIMENSION_STEP: u32 = 64;

fn check_dimension(name: &str, value: Option<u32>) -> Result<(), GatewayError> {
    match value {
        Some(v) if v % DIMENSION_STEP != 0 => Err(GatewayError::InvalidRequest(format!(
            "{} must be a multiple of {}",
            name, DIMENSION_STEP
        ))),
        _ => Ok(()),
    }
}

fn new_image_key() -> String {
    format!("{}{}.png", IMAGE_PREFIX, Uuid::new_v4())
}

pub struct ImageGenerationHandler {
    objects: Arc<dyn ObjectWriter>,
    models: Arc<ModelInvoker>,
}

impl ImageGenerationHandler {
    pub fn new(objects: Arc<dyn ObjectWriter>, models: Arc<ModelInvoker>) -> Self {
        Self { objects, models }
    }
}

#[async_trait]
impl WorkflowHandler for ImageGenerationHandler {
    #[tracing::instrument(skip(self, body, ctx), fields(request_id = %ctx.request_id))]
    async fn handle(
        &self,
        body: Bytes,
        ctx: &RequestContext,
    ) -> Result<WorkflowResponse, GatewayError> {
        let req: ImageRequest = parse_payload(&body)?;
        check_dimension("width", req.width)?;
        check_dimension("height", req.height)?;

        let model_request = ModelRequest::new(req.prompt).with_params(GenerationParams {
            cfg_scale: req.cfg_scale,
            steps: req.steps,
            seed: req.seed,
            width: req.width,
            height: req.height,
            ..Default::default()
        });

        let image = self
            .models
            .invoke(ModelKind::Image, &model_request, ctx.deadline)
            .await?
            .into_image()?;

        let image_key = new_image_key();
        let image_base64 = req.return_image.then(|| STANDARD.encode(&image));
        let size = image.len();

        if let Err(e) = self.objects.put(&image_key, image).await {
            metrics::record_storage_error("object_put");
            tracing::error!(image_key = %image_key, error = %e, "Failed to store generated image");
            return Err(GatewayError::PersistenceFailed(e.to_string()));
        }

        tracing::info!(image_key = %image_key, size, "Image generated");

        Ok(WorkflowResponse::Image(ImageResponse {
            image_key,
            image_base64,
            metadata: GenerationMetadata {
                model: self.models.model_id(ModelKind::Image).to_string(),
                timestamp: format_sort_key(&Utc::now()),
            },
        }))
    }
}
