//! Path-to-workflow dispatch with per-route deadlines.

use crate::config::TimeoutConfig;
use crate::dtos::WorkflowResponse;
use crate::error::GatewayError;
use crate::handlers::{RequestContext, WorkflowHandler};
use crate::services::metrics;
use axum::body::Bytes;
use axum::http::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    GenerateDescription,
    GenerateArticle,
    GenerateImage,
    ListImages,
}

impl Route {
    pub const ALL: [Route; 4] = [
        Route::GenerateDescription,
        Route::GenerateArticle,
        Route::GenerateImage,
        Route::ListImages,
    ];

    /// Matches the last path segment, so `/generate-image` and
    /// `/prod/generate-image` are the same route.
    pub fn from_path(path: &str) -> Option<Self> {
        let suffix = path.trim_end_matches('/').rsplit('/').next()?;
        Route::ALL.into_iter().find(|route| route.as_str() == suffix)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::GenerateDescription => "generate-description",
            Route::GenerateArticle => "generate-article",
            Route::GenerateImage => "generate-image",
            Route::ListImages => "list-images",
        }
    }

    pub fn path(&self) -> String {
        format!("/{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RouteTimeouts {
    pub generation: Duration,
    pub listing: Duration,
}

impl RouteTimeouts {
    pub fn for_route(&self, route: Route) -> Duration {
        match route {
            Route::ListImages => self.listing,
            _ => self.generation,
        }
    }
}

impl From<&TimeoutConfig> for RouteTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            generation: config.generation,
            listing: config.listing,
        }
    }
}

/// One handler per route, fixed at startup.
#[derive(Clone)]
pub struct RouteTable {
    pub description: Arc<dyn WorkflowHandler>,
    pub article: Arc<dyn WorkflowHandler>,
    pub image_generation: Arc<dyn WorkflowHandler>,
    pub image_listing: Arc<dyn WorkflowHandler>,
}

impl RouteTable {
    fn handler(&self, route: Route) -> &dyn WorkflowHandler {
        match route {
            Route::GenerateDescription => self.description.as_ref(),
            Route::GenerateArticle => self.article.as_ref(),
            Route::GenerateImage => self.image_generation.as_ref(),
            Route::ListImages => self.image_listing.as_ref(),
        }
    }
}

#[derive(Clone)]
pub struct WorkflowRouter {
    routes: RouteTable,
    timeouts: RouteTimeouts,
}

impl WorkflowRouter {
    pub fn new(routes: RouteTable, timeouts: RouteTimeouts) -> Self {
        Self { routes, timeouts }
    }

    /// Run the workflow for `path`. The handler future is dropped if the route
    /// deadline passes first.
    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Bytes,
        request_id: &str,
    ) -> Result<WorkflowResponse, GatewayError> {
        let started = Instant::now();

        let Some(route) = Route::from_path(path) else {
            tracing::warn!(path = %path, request_id = %request_id, "No workflow for path");
            let err = GatewayError::RouteNotFound(path.to_string());
            metrics::record_request("unknown", err.status_code().as_u16(), 0.0);
            return Err(err);
        };

        let result = if *method != Method::POST {
            Err(GatewayError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            })
        } else {
            let budget = self.timeouts.for_route(route);
            let ctx = RequestContext {
                request_id: request_id.to_string(),
                deadline: started + budget,
            };
            let handler = self.routes.handler(route);
            match tokio::time::timeout_at(ctx.deadline, handler.handle(body, &ctx)).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(budget)),
            }
        };

        let elapsed = started.elapsed();
        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.status_code().as_u16(),
        };
        metrics::record_request(route.as_str(), status, elapsed.as_secs_f64());

        match &result {
            Ok(_) => tracing::info!(
                route = route.as_str(),
                request_id = %request_id,
                status,
                duration_ms = elapsed.as_millis() as u64,
                "Workflow completed"
            ),
            Err(e) if e.is_client_error() => tracing::warn!(
                route = route.as_str(),
                request_id = %request_id,
                status,
                error = %e,
                "Workflow rejected request"
            ),
            Err(e) => tracing::error!(
                route = route.as_str(),
                request_id = %request_id,
                status,
                duration_ms = elapsed.as_millis() as u64,
                error = %e,
                "Workflow failed"
            ),
        }

        result
    }
}
