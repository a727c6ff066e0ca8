//! `/generate-image`, `/list-images` and `/objects` end to end.

mod common;

use common::{spawn_app, spawn_app_with};
use content_gateway::config::GatewayConfig;
use content_gateway::services::providers::mock::{MockModel, PLACEHOLDER_PNG};
use content_gateway::services::storage::{ObjectLister, ObjectReader, ObjectWriter};
use serde_json::json;

#[tokio::test]
async fn generated_image_is_readable_immediately() {
    let app = spawn_app().await;

    let response = app
        .post("/generate-image", json!({"prompt": "a lighthouse at dusk"}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let key = body["imageKey"].as_str().unwrap();
    assert!(key.starts_with("images/") && key.ends_with(".png"));
    assert!(body.get("imageBase64").is_none());
    assert_eq!(body["model"], "image-model");

    assert_eq!(app.objects.get(key).await.unwrap(), PLACEHOLDER_PNG);
}

#[tokio::test]
async fn listing_returns_generated_keys_in_write_order() {
    let app = spawn_app().await;

    let mut generated = Vec::new();
    for prompt in ["first", "second"] {
        let body: serde_json::Value = app
            .post("/generate-image", json!({"prompt": prompt}))
            .await
            .json()
            .await
            .unwrap();
        generated.push(body["imageKey"].as_str().unwrap().to_string());
    }

    let response = app.post("/list-images", json!({"prefix": "images/"})).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["keys"], json!(generated));
    assert!(body.get("nextPageToken").is_none());
}

#[tokio::test]
async fn model_failure_creates_no_object() {
    let app = spawn_app_with(
        MockModel::echo_text("text-model"),
        MockModel::unavailable("image-model", "content filtered"),
        GatewayConfig::local(),
    )
    .await;

    let response = app.post("/generate-image", json!({"prompt": "a fox"})).await;

    assert_eq!(response.status().as_u16(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "ModelUnavailable");
    assert!(app.objects.list("").await.unwrap().is_empty());
}

#[tokio::test]
async fn returns_base64_when_asked() {
    let app = spawn_app_with(
        MockModel::echo_text("text-model"),
        MockModel::image("image-model", vec![1, 2, 3]),
        GatewayConfig::local(),
    )
    .await;

    let response = app
        .post("/generate-image", json!({"prompt": "a fox", "returnImage": true}))
        .await;

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["imageBase64"], "AQID");
}

#[tokio::test]
async fn listing_pages_through_keys() {
    let app = spawn_app().await;
    for i in 0..5 {
        app.objects
            .put(&format!("images/{}.png", i), vec![i])
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let mut request = json!({"pageSize": 2});
        if let Some(t) = &token {
            request["pageToken"] = json!(t);
        }
        let body: serde_json::Value = app.post("/list-images", request).await.json().await.unwrap();
        for key in body["keys"].as_array().unwrap() {
            seen.push(key.as_str().unwrap().to_string());
        }
        match body.get("nextPageToken").and_then(|t| t.as_str()) {
            Some(t) => token = Some(t.to_string()),
            None => break,
        }
    }

    let expected: Vec<String> = (0..5).map(|i| format!("images/{}.png", i)).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn bad_page_token_is_invalid() {
    let app = spawn_app().await;

    let response = app
        .post("/list-images", json!({"pageToken": "not base64!"}))
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn listed_image_can_be_fetched() {
    let app = spawn_app().await;
    let generated: serde_json::Value = app
        .post("/generate-image", json!({"prompt": "a lighthouse at dusk"}))
        .await
        .json()
        .await
        .unwrap();

    let body: serde_json::Value = app
        .post("/list-images", json!({"includeUrls": true}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["keys"], json!([generated["imageKey"]]));
    let url = body["urls"][0].as_str().unwrap();

    let response = app.get(url).await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.bytes().await.unwrap().as_ref(), PLACEHOLDER_PNG);
}

#[tokio::test]
async fn fetching_unknown_object_is_404() {
    let app = spawn_app().await;

    let response = app.get("/objects/images/none.png").await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "ObjectNotFound");
}
