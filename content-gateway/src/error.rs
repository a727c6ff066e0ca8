//! Workflow error taxonomy and its HTTP mapping.

use crate::services::providers::ModelError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Client error; no model or storage call was attempted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },

    /// The model backend rejected the call. Nothing was persisted.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model did not respond within {0:?}")]
    ModelTimeout(Duration),

    /// Generation succeeded but its result could not be stored.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// A storage read or listing failed before any generation took place.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The route deadline elapsed; work already in flight may have completed.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "InvalidRequest",
            GatewayError::RouteNotFound(_) => "RouteNotFound",
            GatewayError::ObjectNotFound(_) => "ObjectNotFound",
            GatewayError::MethodNotAllowed { .. } => "MethodNotAllowed",
            GatewayError::ModelUnavailable(_) => "ModelUnavailable",
            GatewayError::ModelTimeout(_) => "ModelTimeout",
            GatewayError::PersistenceFailed(_) => "PersistenceFailed",
            GatewayError::StorageUnavailable(_) => "StorageUnavailable",
            GatewayError::Timeout(_) => "Timeout",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::RouteNotFound(_) | GatewayError::ObjectNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::ModelTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::PersistenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<ModelError> for GatewayError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Unavailable(msg) => GatewayError::ModelUnavailable(msg),
            ModelError::Timeout(budget) => GatewayError::ModelTimeout(budget),
        }
    }
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(err: validator::ValidationErrors) -> Self {
        GatewayError::InvalidRequest(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            message: String,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.kind(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
