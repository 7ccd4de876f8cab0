use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::error::AppError;

/// Where recipes and counters live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Mongo,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

/// Server configuration.
///
/// Sources, later ones winning: built-in defaults, an optional
/// `recipebox.toml`, then `RECIPEBOX__*` environment variables
/// (e.g. `RECIPEBOX__MONGODB_URI`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub backend: Backend,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub jwt_secret: String,
    pub publish_interval_secs: u64,
    pub demo_mode: bool,
}

impl AppConfig {
    pub const DEFAULT_FILE: &'static str = "recipebox.toml";
    /// Placeholder secret; only accepted on the `memory` backend.
    pub const DEV_JWT_SECRET: &'static str = "dev-secret";

    /// Load the configuration, reading `file` (or [`Self::DEFAULT_FILE`]) if it exists.
    pub fn load(file: Option<&str>) -> Result<Self, AppError> {
        let file = file.unwrap_or(Self::DEFAULT_FILE);
        let builder = Self::defaults()?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("RECIPEBOX")
                    .prefix_separator("__")
                    .separator("__"),
            );
        Self::finish(builder)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_secs.max(1))
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, AppError> {
        config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:3000")
            .and_then(|b| b.set_default("backend", "mongo"))
            .and_then(|b| b.set_default("mongodb_uri", "mongodb://localhost:27017"))
            .and_then(|b| b.set_default("mongodb_database", "recipebox"))
            .and_then(|b| b.set_default("s3_bucket", "recipebox-images"))
            .and_then(|b| b.set_default("jwt_secret", Self::DEV_JWT_SECRET))
            .and_then(|b| b.set_default("publish_interval_secs", 86_400_i64))
            .and_then(|b| b.set_default("demo_mode", false))
            .map_err(invalid)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, AppError> {
        builder
            .build()
            .and_then(|settings| settings.try_deserialize::<AppConfig>())
            .map_err(invalid)?
            .validate()
    }

    fn validate(self) -> Result<Self, AppError> {
        let placeholder =
            self.jwt_secret.trim().is_empty() || self.jwt_secret == Self::DEV_JWT_SECRET;
        match (self.backend, placeholder) {
            (Backend::Mongo, true) => Err(AppError::Internal(
                "Invalid configuration: jwt_secret must be set for the mongo backend".into(),
            )),
            (Backend::Memory, true) => {
                tracing::warn!("Using the development JWT secret, anyone can sign tokens");
                Ok(self)
            }
            (_, false) => Ok(self),
        }
    }
}

fn invalid(e: config::ConfigError) -> AppError {
    AppError::Internal(format!("Invalid configuration: {e}"))
}
