//! Shared helpers for integration tests.
//!
//! Each test spawns the full application on a random port with in-memory
//! stores and mock model backends, keeping handles to both for assertions.
#![allow(dead_code)]

use content_gateway::config::GatewayConfig;
use content_gateway::services::providers::mock::MockModel;
use content_gateway::services::storage::{InMemoryObjectStore, InMemoryRecordStore};
use content_gateway::services::{ObjectCapabilities, RecordCapabilities};
use content_gateway::startup::{Application, Backends};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub objects: Arc<InMemoryObjectStore>,
    pub records: Arc<InMemoryRecordStore>,
    pub text_model: Arc<MockModel>,
    pub image_model: Arc<MockModel>,
}

impl TestApp {
    pub async fn post(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(&body)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .expect("Failed to send request")
    }
}

/// Spawn with the echoing text model and the placeholder image model.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(
        MockModel::echo_text("text-model"),
        MockModel::placeholder_image("image-model"),
        GatewayConfig::local(),
    )
    .await
}

pub async fn spawn_app_with(text: MockModel, image: MockModel, config: GatewayConfig) -> TestApp {
    let objects = Arc::new(InMemoryObjectStore::new());
    let records = Arc::new(InMemoryRecordStore::new());
    let text_model = Arc::new(text);
    let image_model = Arc::new(image);

    let backends = Backends {
        objects: ObjectCapabilities::from_store(objects.clone()),
        records: RecordCapabilities::from_store(records.clone()),
        text_model: text_model.clone(),
        image_model: image_model.clone(),
    };

    let app = Application::build_with(config, backends)
        .await
        .expect("Failed to build application");
    let port = app.port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: Client::new(),
        objects,
        records,
        text_model,
        image_model,
    }
}
