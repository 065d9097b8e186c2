//! Service configuration, read from `oxapi.toml` with `OXAPI_*`
//! environment overrides.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{OxapiError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Path of the SQLite snapshot the queries run against.
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_owned()
}

fn default_database() -> String {
    "oxapi.db".to_owned()
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("oxapi").required(false))
            .add_source(Environment::with_prefix("OXAPI"))
            .build()
            .map_err(|e| OxapiError::Config(e.to_string()))?;
        config
            .try_deserialize()
            .map_err(|e| OxapiError::Config(e.to_string()))
    }
}
