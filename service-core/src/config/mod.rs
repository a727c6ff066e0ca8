use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings shared by every service in the workspace.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads `configuration.*` (optional) and `APP__*` environment variables.
    ///
    /// A plain `LOG_LEVEL` variable supplies the default verbosity.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level());

        let config = Cfg::builder()
            .set_default("log_level", log_level)?
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}
