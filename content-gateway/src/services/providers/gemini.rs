//! Text model backend speaking the Gemini `generateContent` REST API.

use super::{GenerationParams, ModelBackend, ModelError, ModelOutput, ModelRequest};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client-side ceiling; the route deadline normally fires first.
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API base, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

pub struct GeminiTextModel {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextModel {
    pub fn new(config: GeminiConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ModelError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

fn build_request(request: &ModelRequest) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = &request.image {
        parts.push(ContentPart::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: STANDARD.encode(&image.data),
            },
        });
    }
    parts.push(ContentPart::Text {
        text: request.prompt.clone(),
    });

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
        system_instruction: request.system_prompt.as_ref().map(|system| Content {
            role: None,
            parts: vec![ContentPart::Text {
                text: system.clone(),
            }],
        }),
        generation_config: Some(build_generation_config(&request.params)),
    }
}

fn build_generation_config(params: &GenerationParams) -> GenerationConfig {
    GenerationConfig {
        temperature: params.temperature,
        top_p: params.top_p,
        max_output_tokens: params.max_tokens,
    }
}

/// Concatenated text of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, ModelError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Unavailable("model returned no candidates".to_string()))?;

    if matches!(
        candidate.finish_reason.as_deref(),
        Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST")
    ) {
        return Err(ModelError::Unavailable("content filtered".to_string()));
    }

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(text),
            ContentPart::InlineData { .. } => None,
        })
        .collect();

    if text.trim().is_empty() {
        return Err(ModelError::Unavailable("model returned empty text".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl ModelBackend for GeminiTextModel {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelOutput, ModelError> {
        let body = build_request(request);

        let mut http_request = self.client.post(self.api_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            http_request = http_request.header("x-goog-api-key", key);
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
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Unavailable(format!("Failed to parse response: {}", e)))?;

        extract_text(api_response).map(ModelOutput::Text)
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}
