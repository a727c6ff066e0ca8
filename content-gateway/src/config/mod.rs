use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Location identifier selecting the in-process store backends.
pub const MEMORY_LOCATION: &str = "memory://";

/// Endpoint identifier selecting the in-process model backends.
pub const MOCK_ENDPOINT: &str = "mock";

const DEFAULT_TEXT_MODEL: &str = "anthropic.claude-3-sonnet-20240229-v1:0";
const DEFAULT_IMAGE_MODEL: &str = "stability.stable-diffusion-xl-v1";
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LISTING_TIMEOUT_SECS: u64 = 300;

/// Largest page the listing workflow will return.
pub const MAX_LIST_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub object_store: ObjectStoreConfig,
    pub record_store: RecordStoreConfig,
    pub models: ModelConfig,
    pub timeouts: TimeoutConfig,
    pub listing: ListingConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    /// `memory://` or a directory path.
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordStoreConfig {
    /// `memory://` or a `mongodb://` connection string.
    pub location: String,
    pub database: String,
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the text generation API, or `mock`.
    pub text_endpoint: String,
    /// Base URL of the image generation API, or `mock`.
    pub image_endpoint: String,
    pub text_model: String,
    pub image_model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Deadline for description, article, and image generation.
    pub generation: Duration,
    /// Deadline for image listing.
    pub listing: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    pub page_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub otlp_endpoint: Option<String>,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let page_size: usize = parse_env("LIST_PAGE_SIZE", MAX_LIST_PAGE_SIZE)?;
        if page_size == 0 || page_size > MAX_LIST_PAGE_SIZE {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LIST_PAGE_SIZE must be between 1 and {}",
                MAX_LIST_PAGE_SIZE
            )));
        }

        Ok(GatewayConfig {
            common: common_config,
            object_store: ObjectStoreConfig {
                location: get_env("OBJECT_STORE_LOCATION", Some(MEMORY_LOCATION), is_prod)?,
            },
            record_store: RecordStoreConfig {
                location: get_env("RECORD_STORE_LOCATION", Some(MEMORY_LOCATION), is_prod)?,
                database: get_env("RECORD_STORE_DATABASE", Some("content_gateway"), false)?,
                collection: get_env("RECORD_STORE_COLLECTION", Some("user_feedback"), false)?,
            },
            models: ModelConfig {
                text_endpoint: get_env("TEXT_MODEL_ENDPOINT", Some(MOCK_ENDPOINT), is_prod)?,
                image_endpoint: get_env("IMAGE_MODEL_ENDPOINT", Some(MOCK_ENDPOINT), is_prod)?,
                text_model: get_env("TEXT_MODEL_ID", Some(DEFAULT_TEXT_MODEL), false)?,
                image_model: get_env("IMAGE_MODEL_ID", Some(DEFAULT_IMAGE_MODEL), false)?,
                api_key: env::var("MODEL_API_KEY").ok().filter(|k| !k.is_empty()),
            },
            timeouts: TimeoutConfig {
                generation: timeout_secs(
                    "ROUTE_TIMEOUT_SECS",
                    parse_env("ROUTE_TIMEOUT_SECS", DEFAULT_GENERATION_TIMEOUT_SECS)?,
                )?,
                listing: timeout_secs(
                    "LIST_TIMEOUT_SECS",
                    parse_env("LIST_TIMEOUT_SECS", DEFAULT_LISTING_TIMEOUT_SECS)?,
                )?,
            },
            listing: ListingConfig { page_size },
            observability: ObservabilityConfig {
                otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|e| !e.is_empty()),
            },
        })
    }

    /// Fully in-process configuration: memory stores, mock models, random port.
    pub fn local() -> Self {
        GatewayConfig {
            common: core_config::Config {
                port: 0,
                ..Default::default()
            },
            object_store: ObjectStoreConfig {
                location: MEMORY_LOCATION.to_string(),
            },
            record_store: RecordStoreConfig {
                location: MEMORY_LOCATION.to_string(),
                database: "content_gateway".to_string(),
                collection: "user_feedback".to_string(),
            },
            models: ModelConfig {
                text_endpoint: MOCK_ENDPOINT.to_string(),
                image_endpoint: MOCK_ENDPOINT.to_string(),
                text_model: DEFAULT_TEXT_MODEL.to_string(),
                image_model: DEFAULT_IMAGE_MODEL.to_string(),
                api_key: None,
            },
            timeouts: TimeoutConfig {
                generation: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
                listing: Duration::from_secs(DEFAULT_LISTING_TIMEOUT_SECS),
            },
            listing: ListingConfig {
                page_size: MAX_LIST_PAGE_SIZE,
            },
            observability: ObservabilityConfig {
                otlp_endpoint: None,
            },
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// A route deadline of zero would fail every request.
fn timeout_secs(key: &str, secs: u64) -> Result<Duration, AppError> {
    if secs == 0 {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be at least 1 second",
            key
        )));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, val, e))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_config_uses_in_process_backends() {
        let config = GatewayConfig::local();
        assert_eq!(config.common.port, 0);
        assert_eq!(config.object_store.location, MEMORY_LOCATION);
        assert_eq!(config.record_store.location, MEMORY_LOCATION);
        assert_eq!(config.models.text_endpoint, MOCK_ENDPOINT);
        assert_eq!(config.timeouts.generation, Duration::from_secs(60));
        assert_eq!(config.timeouts.listing, Duration::from_secs(300));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(timeout_secs("ROUTE_TIMEOUT_SECS", 0).is_err());
        assert!(timeout_secs("LIST_TIMEOUT_SECS", 0).is_err());
        assert_eq!(
            timeout_secs("ROUTE_TIMEOUT_SECS", 30).unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn parse_env_falls_back_to_default() {
        let value: u64 = parse_env("CONTENT_GATEWAY_UNSET_FOR_TEST", 42).unwrap();
        assert_eq!(value, 42);
    }
}
