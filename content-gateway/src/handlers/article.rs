//! Article title workflow. Text in, title and subtitles out; touches no storage.

use super::{parse_payload, RequestContext, WorkflowHandler};
use crate::dtos::{ArticleRequest, ArticleResponse, GenerationMetadata, WorkflowResponse};
use crate::error::GatewayError;
use crate::services::clock::format_sort_key;
use crate::services::providers::{GenerationParams, ModelInvoker, ModelKind, ModelRequest};
use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "I will provide the content of an article. Generate a title for \
the article and a subtitle for each of its paragraphs.\n\
Answer in this format:\n\
Title: Example Title\n\
Subtitles:\n\
1. Example Subtitle 1\n\
2. Example Subtitle 2";

const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 0.9;
const MAX_TOKENS: u32 = 2000;

#[derive(Debug, PartialEq)]
struct ArticleOutline {
    title: String,
    subtitles: Vec<String>,
}

/// `1. Foo`, `2) Foo`, `- Foo`, `* Foo` -> `Foo`.
fn strip_list_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(str::trim)
}

fn parse_outline(output: &str) -> ArticleOutline {
    let mut title = None;
    let mut subtitles = Vec::new();
    let mut in_subtitles = false;

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(rest) = line.strip_prefix("Title:") {
            if title.is_none() {
                title = Some(rest.trim().trim_matches('"').to_string());
            }
            in_subtitles = false;
        } else if line.starts_with("Subtitles:") {
            in_subtitles = true;
        } else if in_subtitles {
            if let Some(subtitle) = strip_list_marker(line).filter(|s| !s.is_empty()) {
                subtitles.push(subtitle.trim_matches('"').to_string());
            }
        }
    }

    let title = title.filter(|t| !t.is_empty()).unwrap_or_else(|| {
        output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string()
    });

    ArticleOutline { title, subtitles }
}

pub struct ArticleHandler {
    models: Arc<ModelInvoker>,
}

impl ArticleHandler {
    pub fn new(models: Arc<ModelInvoker>) -> Self {
        Self { models }
    }
}

#[async_trait]
impl WorkflowHandler for ArticleHandler {
    #[tracing::instrument(skip(self, body, ctx), fields(request_id = %ctx.request_id))]
    async fn handle(
        &self,
        body: Bytes,
        ctx: &RequestContext,
    ) -> Result<WorkflowResponse, GatewayError> {
        let req: ArticleRequest = parse_payload(&body)?;

        let model_request = ModelRequest::new(req.text)
            .with_system_prompt(SYSTEM_PROMPT)
            .with_params(GenerationParams {
                temperature: Some(TEMPERATURE),
                top_p: Some(TOP_P),
                max_tokens: Some(MAX_TOKENS),
                ..Default::default()
            });

        let output = self
            .models
            .invoke(ModelKind::Text, &model_request, ctx.deadline)
            .await?
            .into_text()?;

        let outline = parse_outline(&output);
        tracing::info!(subtitles = outline.subtitles.len(), "Article outline generated");

        Ok(WorkflowResponse::Article(ArticleResponse {
            subtitle: outline.subtitles.first().cloned().unwrap_or_default(),
            title: outline.title,
            subtitles: outline.subtitles,
            metadata: GenerationMetadata {
                model: self.models.model_id(ModelKind::Text).to_string(),
                timestamp: format_sort_key(&Utc::now()),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockModel;
    use std::time::Duration;
    use tokio::time::Instant;

    fn handler(text: MockModel) -> ArticleHandler {
        ArticleHandler::new(Arc::new(ModelInvoker::new(
            Arc::new(text),
            Arc::new(MockModel::placeholder_image("image-model")),
        )))
    }

    fn ctx() -> RequestContext {
        RequestContext {
            request_id: "req-1".to_string(),
            deadline: Instant::now() + Duration::from_secs(5),
        }
    }

    #[test]
    fn parses_title_and_numbered_subtitles() {
        let outline = parse_outline(
            "Title: Rust at Scale\nSubtitles:\n1. Ownership\n2) Fearless concurrency\n- Tooling\n",
        );
        assert_eq!(outline.title, "Rust at Scale");
        assert_eq!(
            outline.subtitles,
            vec!["Ownership", "Fearless concurrency", "Tooling"]
        );
    }

    #[test]
    fn first_line_is_title_when_unlabelled() {
        let outline = parse_outline("\n  Why Rust?  \nSome prose.");
        assert_eq!(outline.title, "Why Rust?");
        assert!(outline.subtitles.is_empty());
    }

    #[test]
    fn list_marker_requires_separator() {
        assert_eq!(strip_list_marker("12. Twelve"), Some("Twelve"));
        assert_eq!(strip_list_marker("2024 was a year"), None);
        assert_eq!(strip_list_marker("plain"), None);
    }

    #[tokio::test]
    async fn returns_first_subtitle_and_all_subtitles() {
        let handler = handler(MockModel::text(
            "text-model",
            "Title: A\nSubtitles:\n1. B\n2. C",
        ));

        let response = handler
            .handle(Bytes::from_static(br#"{"text": "Once upon a time"}"#), &ctx())
            .await
            .unwrap();

        let WorkflowResponse::Article(article) = response else {
            panic!("unexpected response");
        };
        assert_eq!(article.title, "A");
        assert_eq!(article.subtitle, "B");
        assert_eq!(article.subtitles, vec!["B", "C"]);
        assert_eq!(article.metadata.model, "text-model");
    }

    #[tokio::test]
    async fn sends_text_with_system_prompt() {
        let text = Arc::new(MockModel::text("text-model", "Title: A"));
        let handler = ArticleHandler::new(Arc::new(ModelInvoker::new(
            text.clone(),
            Arc::new(MockModel::placeholder_image("image-model")),
        )));

        handler
            .handle(Bytes::from_static(br#"{"content": "Paragraph one."}"#), &ctx())
            .await
            .unwrap();

        let sent = text.last_request().unwrap();
        assert_eq!(sent.prompt, "Paragraph one.");
        assert_eq!(sent.system_prompt.as_deref(), Some(SYSTEM_PROMPT));
        assert_eq!(sent.params.max_tokens, Some(MAX_TOKENS));
    }

    #[tokio::test]
    async fn model_failure_is_reported() {
        let handler = handler(MockModel::unavailable("text-model", "outage"));

        let err = handler
            .handle(Bytes::from_static(br#"{"text": "hello"}"#), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ModelUnavailable");
    }
}
