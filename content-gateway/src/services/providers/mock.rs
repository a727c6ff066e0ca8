//! In-process model backends for local development and testing.

use super::{ModelBackend, ModelError, ModelOutput, ModelRequest};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A 1x1 transparent PNG.
pub const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Debug, Clone)]
enum Behavior {
    /// Structured text derived from the prompt.
    Echo,
    Text(String),
    Image(Vec<u8>),
    Unavailable(String),
}

/// Deterministic model backend. Counts calls and remembers the last request.
pub struct MockModel {
    model_id: String,
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
    last_request: Mutex<Option<ModelRequest>>,
}

impl MockModel {
    fn with_behavior(model_id: impl Into<String>, behavior: Behavior) -> Self {
        Self {
            model_id: model_id.into(),
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Answers with `Title:` / `Description:` / `Subtitles:` lines built from the prompt.
    pub fn echo_text(model_id: impl Into<String>) -> Self {
        Self::with_behavior(model_id, Behavior::Echo)
    }

    pub fn text(model_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_behavior(model_id, Behavior::Text(text.into()))
    }

    pub fn image(model_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::with_behavior(model_id, Behavior::Image(bytes))
    }

    pub fn placeholder_image(model_id: impl Into<String>) -> Self {
        Self::image(model_id, PLACEHOLDER_PNG.to_vec())
    }

    pub fn unavailable(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_behavior(model_id, Behavior::Unavailable(reason.into()))
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        self.last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl ModelBackend for MockModel {
    fn provider(&self) -> &'static str {
        "mock"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelOutput, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Echo => {
                let topic: String = request
                    .prompt
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .unwrap_or_default()
                    .chars()
                    .take(80)
                    .collect();
                Ok(ModelOutput::Text(format!(
                    "Title: Mock title\nDescription: Mock response for: {}\nSubtitles:\n1. Mock subtitle",
                    topic
                )))
            }
            Behavior::Text(text) => Ok(ModelOutput::Text(text.clone())),
            Behavior::Image(bytes) => Ok(ModelOutput::Image(bytes.clone())),
            Behavior::Unavailable(reason) => Err(ModelError::Unavailable(reason.clone())),
        }
    }
}
