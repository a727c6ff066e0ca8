//! Generative model backends and the invoker the workflows call through.
//!
//! A backend is one external model (text or image). [`ModelInvoker`] picks the
//! backend for a [`ModelKind`], bounds the call by the request deadline, and
//! reports latency and failures. It never retries or caches.

pub mod gemini;
pub mod mock;
pub mod stability;

use crate::services::metrics;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Text,
    Image,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Text => "text",
            ModelKind::Image => "image",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    /// Rejected by the backend: quota, malformed prompt, outage, filtered
    /// content, or an unreadable response.
    #[error("{0}")]
    Unavailable(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Image bytes sent alongside a text prompt.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Sampling parameters. Backends ignore the ones that do not apply to them.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub cfg_scale: Option<f32>,
    pub steps: Option<u32>,
    pub seed: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub image: Option<InlineImage>,
    pub params: GenerationParams,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            image: None,
            params: GenerationParams::default(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

/// Raw backend output.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Text(String),
    Image(Vec<u8>),
}

impl ModelOutput {
    pub fn into_text(self) -> Result<String, ModelError> {
        match self {
            ModelOutput::Text(text) => Ok(text),
            ModelOutput::Image(_) => Err(ModelError::Unavailable(
                "expected text output, backend returned an image".to_string(),
            )),
        }
    }

    pub fn into_image(self) -> Result<Vec<u8>, ModelError> {
        match self {
            ModelOutput::Image(bytes) if !bytes.is_empty() => Ok(bytes),
            ModelOutput::Image(_) => Err(ModelError::Unavailable(
                "backend returned an empty image".to_string(),
            )),
            ModelOutput::Text(_) => Err(ModelError::Unavailable(
                "expected image output, backend returned text".to_string(),
            )),
        }
    }
}

/// One external generative model.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Provider name used in logs and metrics.
    fn provider(&self) -> &'static str;

    fn model_id(&self) -> &str;

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelOutput, ModelError>;
}

pub struct ModelInvoker {
    text: Arc<dyn ModelBackend>,
    image: Arc<dyn ModelBackend>,
}

impl ModelInvoker {
    pub fn new(text: Arc<dyn ModelBackend>, image: Arc<dyn ModelBackend>) -> Self {
        Self { text, image }
    }

    fn backend(&self, kind: ModelKind) -> &dyn ModelBackend {
        match kind {
            ModelKind::Text => self.text.as_ref(),
            ModelKind::Image => self.image.as_ref(),
        }
    }

    pub fn model_id(&self, kind: ModelKind) -> &str {
        self.backend(kind).model_id()
    }

    /// Single call to the backend for `kind`, abandoned at `deadline`.
    pub async fn invoke(
        &self,
        kind: ModelKind,
        request: &ModelRequest,
        deadline: Instant,
    ) -> Result<ModelOutput, ModelError> {
        let backend = self.backend(kind);
        let started = Instant::now();
        let budget = deadline.saturating_duration_since(started);

        tracing::debug!(
            kind = %kind,
            provider = backend.provider(),
            model = backend.model_id(),
            prompt_len = request.prompt.len(),
            has_image = request.image.is_some(),
            budget_ms = budget.as_millis() as u64,
            "Invoking model"
        );

        let result = match tokio::time::timeout_at(deadline, backend.invoke(request)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout(budget)),
        };

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_model_latency(kind.as_str(), backend.model_id(), elapsed);

        match &result {
            Ok(_) => tracing::info!(
                kind = %kind,
                model = backend.model_id(),
                elapsed_secs = elapsed,
                "Model invocation succeeded"
            ),
            Err(e) => {
                let error_type = match e {
                    ModelError::Unavailable(_) => "unavailable",
                    ModelError::Timeout(_) => "timeout",
                };
                metrics::record_model_error(kind.as_str(), error_type);
                tracing::warn!(
                    kind = %kind,
                    model = backend.model_id(),
                    error = %e,
                    "Model invocation failed"
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockModel;
    use super::*;

    fn invoker(text: MockModel, image: MockModel) -> ModelInvoker {
        ModelInvoker::new(Arc::new(text), Arc::new(image))
    }

    #[tokio::test]
    async fn routes_by_kind() {
        let invoker = invoker(
            MockModel::text("text-model", "hello"),
            MockModel::image("image-model", vec![9, 9]),
        );
        let deadline = Instant::now() + Duration::from_secs(5);

        let text = invoker
            .invoke(ModelKind::Text, &ModelRequest::new("hi"), deadline)
            .await
            .unwrap();
        assert_eq!(text, ModelOutput::Text("hello".to_string()));

        let image = invoker
            .invoke(ModelKind::Image, &ModelRequest::new("a cat"), deadline)
            .await
            .unwrap();
        assert_eq!(image, ModelOutput::Image(vec![9, 9]));
        assert_eq!(invoker.model_id(ModelKind::Image), "image-model");
    }

    #[tokio::test]
    async fn slow_backend_times_out_at_deadline() {
        let invoker = invoker(
            MockModel::text("text-model", "late").with_delay(Duration::from_secs(5)),
            MockModel::placeholder_image("image-model"),
        );
        let deadline = Instant::now() + Duration::from_millis(50);

        let result = invoker
            .invoke(ModelKind::Text, &ModelRequest::new("hi"), deadline)
            .await;
        assert!(matches!(result, Err(ModelError::Timeout(_))));
    }

    #[tokio::test]
    async fn backend_rejection_is_unavailable() {
        let invoker = invoker(
            MockModel::unavailable("text-model", "quota exceeded"),
            MockModel::placeholder_image("image-model"),
        );
        let deadline = Instant::now() + Duration::from_secs(5);

        let result = invoker
            .invoke(ModelKind::Text, &ModelRequest::new("hi"), deadline)
            .await;
        assert!(matches!(result, Err(ModelError::Unavailable(msg)) if msg == "quota exceeded"));
    }

    #[test]
    fn output_kind_mismatch_is_unavailable() {
        assert!(ModelOutput::Image(vec![1]).into_text().is_err());
        assert!(ModelOutput::Text("x".into()).into_image().is_err());
        assert!(ModelOutput::Image(vec![]).into_image().is_err());
    }
}
