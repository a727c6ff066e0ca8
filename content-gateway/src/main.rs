use content_gateway::config::GatewayConfig;
use content_gateway::startup::Application;
use service_core::error::AppError;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = GatewayConfig::load()?;

    init_tracing(
        "content-gateway",
        &config.common.log_level,
        config.observability.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        object_store = %config.object_store.location,
        text_endpoint = %config.models.text_endpoint,
        image_endpoint = %config.models.image_endpoint,
        "Starting content gateway"
    );

    let app = Application::build(config).await?;
    app.run_until_stopped().await?;

    tracing::info!("Content gateway stopped");
    Ok(())
}
