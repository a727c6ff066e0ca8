//! `/generate-description` end to end.

mod common;

use common::{spawn_app_with, TestApp};
use content_gateway::config::GatewayConfig;
use content_gateway::services::providers::mock::{MockModel, PLACEHOLDER_PNG};
use content_gateway::services::storage::{ObjectWriter, RecordQuery};
use serde_json::json;

async fn app_with_text(text: MockModel) -> TestApp {
    let app = spawn_app_with(
        text,
        MockModel::placeholder_image("image-model"),
        GatewayConfig::local(),
    )
    .await;
    app.objects
        .put("img-1", PLACEHOLDER_PNG.to_vec())
        .await
        .expect("Failed to seed image");
    app
}

#[tokio::test]
async fn describes_image_and_records_feedback() {
    let app = app_with_text(MockModel::text("text-model", "a red bicycle")).await;

    let response = app
        .post("/generate-description", json!({"imageRef": "img-1", "userId": "u1"}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["description"], "a red bicycle");
    assert_eq!(body["model"], "text-model");

    let records = app.records.query("u1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, "u1");
    assert_eq!(records[0].timestamp, body["timestamp"].as_str().unwrap());
    assert_eq!(records[0].final_description, "a red bicycle");
}

#[tokio::test]
async fn title_and_description_lines_are_split() {
    let app = app_with_text(MockModel::text(
        "text-model",
        "Title: \"Sweet Moments\"\nDescription: Perfect day for a treat!",
    ))
    .await;

    let response = app
        .post(
            "/generate-description",
            json!({"imageRef": "img-1", "userId": "u1", "promptType": "Instagram Story"}),
        )
        .await;

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["title"], "Sweet Moments");
    assert_eq!(body["description"], "Perfect day for a treat!");
}

#[tokio::test]
async fn repeated_calls_get_increasing_timestamps() {
    let app = app_with_text(MockModel::text("text-model", "a red bicycle")).await;

    for _ in 0..3 {
        let response = app
            .post("/generate-description", json!({"imageRef": "img-1", "userId": "u1"}))
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    let records = app.records.query("u1").await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records
        .windows(2)
        .all(|pair| pair[0].timestamp < pair[1].timestamp));
}

#[tokio::test]
async fn missing_user_id_is_rejected_before_any_work() {
    let app = app_with_text(MockModel::text("text-model", "unused")).await;

    let response = app
        .post("/generate-description", json!({"imageRef": "img-1"}))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "InvalidRequest");
    assert_eq!(app.text_model.calls(), 0);
    assert!(app.records.is_empty().await);
}

#[tokio::test]
async fn unknown_image_is_rejected() {
    let app = app_with_text(MockModel::text("text-model", "unused")).await;

    let response = app
        .post("/generate-description", json!({"imageRef": "img-404", "userId": "u1"}))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.text_model.calls(), 0);
}

#[tokio::test]
async fn model_outage_stores_no_record() {
    let app = app_with_text(MockModel::unavailable("text-model", "quota exceeded")).await;

    let response = app
        .post("/generate-description", json!({"imageRef": "img-1", "userId": "u1"}))
        .await;

    assert_eq!(response.status().as_u16(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "ModelUnavailable");
    assert!(app.records.is_empty().await);
}
