//! Prometheus metrics for the content gateway.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Workflow metrics
pub static WORKFLOW_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static WORKFLOW_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Model metrics
pub static MODEL_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static MODEL_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Storage metrics
pub static STORAGE_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("workflow_requests_total", "Total number of workflow requests"),
        &["route", "status"],
    )?;

    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "workflow_request_duration_seconds",
            "Workflow request duration in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["route"],
    )?;

    let model_latency = HistogramVec::new(
        HistogramOpts::new("model_latency_seconds", "Model backend latency in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["kind", "model"],
    )?;

    let model_errors = IntCounterVec::new(
        Opts::new("model_errors_total", "Total model backend errors"),
        &["kind", "error_type"],
    )?;

    let storage_errors = IntCounterVec::new(
        Opts::new("storage_errors_total", "Total storage operation errors"),
        &["operation"],
    )?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(model_latency.clone()))?;
    registry.register(Box::new(model_errors.clone()))?;
    registry.register(Box::new(storage_errors.clone()))?;

    // Lost races leave the first registration in place.
    if REGISTRY.set(registry).is_err() {
        return Ok(());
    }
    let _ = WORKFLOW_REQUESTS_TOTAL.set(requests_total);
    let _ = WORKFLOW_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = MODEL_LATENCY_SECONDS.set(model_latency);
    let _ = MODEL_ERRORS_TOTAL.set(model_errors);
    let _ = STORAGE_ERRORS_TOTAL.set(storage_errors);

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Record a completed workflow request.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    if let Some(counter) = WORKFLOW_REQUESTS_TOTAL.get() {
        let status = status.to_string();
        counter.with_label_values(&[route, status.as_str()]).inc();
    }
    if let Some(histogram) = WORKFLOW_REQUEST_DURATION_SECONDS.get() {
        histogram.with_label_values(&[route]).observe(duration_secs);
    }
}

pub fn record_model_latency(kind: &str, model: &str, duration_secs: f64) {
    if let Some(histogram) = MODEL_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[kind, model])
            .observe(duration_secs);
    }
}

pub fn record_model_error(kind: &str, error_type: &str) {
    if let Some(counter) = MODEL_ERRORS_TOTAL.get() {
        counter.with_label_values(&[kind, error_type]).inc();
    }
}

pub fn record_storage_error(operation: &str) {
    if let Some(counter) = STORAGE_ERRORS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_recorded_requests() {
        init_metrics().unwrap();
        init_metrics().unwrap();
        record_request("generate-article", 200, 0.2);

        let text = get_metrics();
        assert!(text.contains("workflow_requests_total"));
        assert!(text.contains("route=\"generate-article\""));
    }
}
