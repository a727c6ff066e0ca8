//! `/generate-article` end to end.

mod common;

use common::{spawn_app, spawn_app_with};
use content_gateway::config::GatewayConfig;
use content_gateway::services::providers::mock::MockModel;
use serde_json::json;

#[tokio::test]
async fn returns_title_and_subtitles() {
    let app = spawn_app_with(
        MockModel::text(
            "text-model",
            "Title: Rust at Scale\nSubtitles:\n1. Ownership\n2. Fearless concurrency",
        ),
        MockModel::placeholder_image("image-model"),
        GatewayConfig::local(),
    )
    .await;

    let response = app
        .post("/generate-article", json!({"text": "1.\nRust is...\n2.\nThreads are..."}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["title"], "Rust at Scale");
    assert_eq!(body["subtitle"], "Ownership");
    assert_eq!(body["subtitles"], json!(["Ownership", "Fearless concurrency"]));
    assert_eq!(body["model"], "text-model");
}

#[tokio::test]
async fn accepts_content_field() {
    let app = spawn_app().await;

    let response = app
        .post("/generate-article", json!({"content": "A short story."}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["title"], "Mock title");
    assert_eq!(body["subtitle"], "Mock subtitle");
}

#[tokio::test]
async fn model_failure_leaves_storage_untouched() {
    let app = spawn_app_with(
        MockModel::unavailable("text-model", "outage"),
        MockModel::placeholder_image("image-model"),
        GatewayConfig::local(),
    )
    .await;

    let response = app
        .post("/generate-article", json!({"text": "anything"}))
        .await;

    assert_eq!(response.status().as_u16(), 502);
    assert!(app.objects.is_empty().await);
    assert!(app.records.is_empty().await);
}

#[tokio::test]
async fn empty_text_is_invalid() {
    let app = spawn_app().await;

    let response = app.post("/generate-article", json!({"text": "   "})).await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.text_model.calls(), 0);
}
