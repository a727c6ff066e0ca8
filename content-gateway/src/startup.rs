//! Application startup and lifecycle management.
//!
//! Builds store handles and model backends from configuration, wires them into
//! the four workflow handlers, and serves the workflow router alongside the
//! object, health, readiness, and metrics endpoints.

use crate::config::{GatewayConfig, MEMORY_LOCATION, MOCK_ENDPOINT};
use crate::handlers::object_fetch::OBJECT_ROUTE;
use crate::handlers::{
    ArticleHandler, DescriptionHandler, ImageGenerationHandler, ImageListingHandler,
    ObjectFetcher,
};
use crate::router::{RouteTable, RouteTimeouts, WorkflowRouter};
use crate::services::metrics;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextModel};
use crate::services::providers::mock::MockModel;
use crate::services::providers::stability::{StabilityConfig, StabilityImageModel};
use crate::services::storage::{
    InMemoryObjectStore, InMemoryRecordStore, LocalObjectStore, StoreHealth,
};
use crate::services::{
    FeedbackDb, ModelBackend, ModelInvoker, MonotonicClock, ObjectCapabilities,
    RecordCapabilities,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

const SERVICE_NAME: &str = "content-gateway";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub router: WorkflowRouter,
    pub objects: Arc<ObjectFetcher>,
    health: Vec<Arc<dyn StoreHealth>>,
}

/// Store handles and model backends the handlers are built from.
#[derive(Clone)]
pub struct Backends {
    pub objects: ObjectCapabilities,
    pub records: RecordCapabilities,
    pub text_model: Arc<dyn ModelBackend>,
    pub image_model: Arc<dyn ModelBackend>,
}

impl Backends {
    /// Select backends from the configured locations and endpoints.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self, AppError> {
        let objects = build_object_store(&config.object_store.location).await?;
        let records = build_record_store(config).await?;

        let models = &config.models;
        let text_model: Arc<dyn ModelBackend> = if models.text_endpoint == MOCK_ENDPOINT {
            Arc::new(MockModel::echo_text(models.text_model.as_str()))
        } else {
            let model = GeminiTextModel::new(GeminiConfig {
                endpoint: models.text_endpoint.clone(),
                model: models.text_model.clone(),
                api_key: models.api_key.clone(),
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("text model: {}", e)))?;
            Arc::new(model)
        };

        let image_model: Arc<dyn ModelBackend> = if models.image_endpoint == MOCK_ENDPOINT {
            Arc::new(MockModel::placeholder_image(models.image_model.as_str()))
        } else {
            let model = StabilityImageModel::new(StabilityConfig {
                endpoint: models.image_endpoint.clone(),
                model: models.image_model.clone(),
                api_key: models.api_key.clone(),
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("image model: {}", e)))?;
            Arc::new(model)
        };

        tracing::info!(
            text_provider = text_model.provider(),
            text_model = text_model.model_id(),
            image_provider = image_model.provider(),
            image_model = image_model.model_id(),
            "Initialized model backends"
        );

        Ok(Self {
            objects,
            records,
            text_model,
            image_model,
        })
    }
}

async fn build_object_store(location: &str) -> Result<ObjectCapabilities, AppError> {
    if location == MEMORY_LOCATION {
        tracing::info!("Using in-memory object store");
        return Ok(ObjectCapabilities::from_store(Arc::new(
            InMemoryObjectStore::new(),
        )));
    }

    let path = location.strip_prefix("file://").unwrap_or(location);
    let store = LocalObjectStore::new(path).await.map_err(|e| {
        tracing::error!("Failed to open object store at {}: {}", path, e);
        AppError::StorageError(anyhow::Error::new(e))
    })?;
    tracing::info!(path = %path, "Using local filesystem object store");
    Ok(ObjectCapabilities::from_store(Arc::new(store)))
}

async fn build_record_store(config: &GatewayConfig) -> Result<RecordCapabilities, AppError> {
    let settings = &config.record_store;
    if settings.location == MEMORY_LOCATION {
        tracing::info!("Using in-memory record store");
        return Ok(RecordCapabilities::from_store(Arc::new(
            InMemoryRecordStore::new(),
        )));
    }

    if !settings.location.starts_with("mongodb://")
        && !settings.location.starts_with("mongodb+srv://")
    {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "RECORD_STORE_LOCATION must be {} or a mongodb:// URI",
            MEMORY_LOCATION
        )));
    }

    let db = FeedbackDb::connect(&settings.location, &settings.database, &settings.collection)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            e
        })?;

    db.initialize_indexes().await.map_err(|e| {
        tracing::error!("Failed to initialize database indexes: {}", e);
        e
    })?;

    Ok(RecordCapabilities::from_store(Arc::new(db)))
}

/// Wire each handler to exactly the capabilities it is granted.
fn build_workflow_router(config: &GatewayConfig, backends: Backends) -> WorkflowRouter {
    let models = Arc::new(ModelInvoker::new(
        backends.text_model,
        backends.image_model,
    ));
    let clock = Arc::new(MonotonicClock::new());

    let routes = RouteTable {
        description: Arc::new(DescriptionHandler::new(
            backends.objects.reader,
            backends.records.appender,
            models.clone(),
            clock,
        )),
        article: Arc::new(ArticleHandler::new(models.clone())),
        image_generation: Arc::new(ImageGenerationHandler::new(
            backends.objects.writer,
            models,
        )),
        image_listing: Arc::new(ImageListingHandler::new(
            backends.objects.lister,
            config.listing.page_size,
        )),
    };

    WorkflowRouter::new(routes, RouteTimeouts::from(&config.timeouts))
}

/// Liveness check.
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness check: every store must answer.
async fn readiness_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    for store in &state.health {
        if let Err(e) = store.health_check().await {
            tracing::warn!(store = store.name(), error = %e, "Readiness check failed");
            return Err(AppError::ServiceUnavailable);
        }
    }
    Ok(Json(json!({ "status": "ready" })))
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::get_metrics(),
    )
}

/// Raw bytes of a stored object.
async fn fetch_object(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.objects.fetch(&key).await {
        Ok(object) => ([(header::CONTENT_TYPE, object.content_type)], object.data).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Every path that is not an operational endpoint goes through the workflow router.
async fn dispatch_workflow(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match state
        .router
        .dispatch(&method, uri.path(), body, &request_id)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// The full HTTP surface for `state`.
pub fn http_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .route(&format!("{}/*key", OBJECT_ROUTE), get(fetch_object))
        .fallback(dispatch_workflow)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with backends selected by `config`.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let backends = Backends::from_config(&config).await?;
        Self::build_with(config, backends).await
    }

    /// Build the application around already constructed backends.
    pub async fn build_with(config: GatewayConfig, backends: Backends) -> Result<Self, AppError> {
        metrics::init_metrics()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("metrics: {}", e)))?;

        let health = vec![backends.objects.health.clone(), backends.records.health.clone()];
        let objects = Arc::new(ObjectFetcher::new(backends.objects.reader.clone()));
        let router = build_workflow_router(&config, backends);

        let state = AppState {
            router,
            objects,
            health,
        };

        // Port 0 picks a random port, used by tests.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Content gateway listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = http_router(self.state);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
