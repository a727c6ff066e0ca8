//! Image model backend speaking the Stability text-to-image REST API.

use super::{ModelBackend, ModelError, ModelOutput, ModelRequest};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_CFG_SCALE: f32 = 7.0;
const DEFAULT_STEPS: u32 = 30;
const DEFAULT_DIMENSION: u32 = 1024;

#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// API base, e.g. `https://api.stability.ai`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

pub struct StabilityImageModel {
    config: StabilityConfig,
    client: Client,
}

impl StabilityImageModel {
    pub fn new(config: StabilityConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ModelError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/generation/{}/text-to-image",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

fn build_request(request: &ModelRequest) -> TextToImageRequest {
    let params = &request.params;
    TextToImageRequest {
        text_prompts: vec![TextPrompt {
            text: request.prompt.clone(),
            weight: 1.0,
        }],
        cfg_scale: params.cfg_scale.unwrap_or(DEFAULT_CFG_SCALE),
        steps: params.steps.unwrap_or(DEFAULT_STEPS),
        seed: params.seed.unwrap_or(0),
        width: params.width.unwrap_or(DEFAULT_DIMENSION),
        height: params.height.unwrap_or(DEFAULT_DIMENSION),
        samples: 1,
    }
}

/// Decoded bytes of the first artifact.
fn extract_image(response: TextToImageResponse) -> Result<Vec<u8>, ModelError> {
    let artifact = response
        .artifacts
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Unavailable("model returned no artifacts".to_string()))?;

    match artifact.finish_reason.as_deref() {
        Some("ERROR") | Some("CONTENT_FILTERED") => {
            return Err(ModelError::Unavailable(format!(
                "image generation failed: {}",
                artifact.finish_reason.unwrap_or_default()
            )));
        }
        _ => {}
    }

    STANDARD
        .decode(artifact.base64.as_bytes())
        .map_err(|e| ModelError::Unavailable(format!("invalid image payload: {}", e)))
}

#[async_trait]
impl ModelBackend for StabilityImageModel {
    fn provider(&self) -> &'static str {
        "stability"
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelOutput, ModelError> {
        let body = build_request(request);

        let mut http_request = self
            .client
            .post(self.api_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(format!("Network error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ModelError::Unavailable("rate limited".to_string()));
            }

            return Err(ModelError::Unavailable(format!(
                "Stability API error {}: {}",
                status, error_text
            )));
        }

        let api_response: TextToImageResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Unavailable(format!("Failed to parse response: {}", e)))?;

        extract_image(api_response).map(ModelOutput::Image)
    }
}

#[derive(Debug, Serialize)]
struct TextToImageRequest {
    text_prompts: Vec<TextPrompt>,
    cfg_scale: f32,
    steps: u32,
    seed: u32,
    width: u32,
    height: u32,
    samples: u32,
}

#[derive(Debug, Serialize)]
struct TextPrompt {
    text: String,
    weight: f32,
}

#[derive(Debug, Deserialize)]
struct TextToImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    base64: String,
    finish_reason: Option<String>,
}
