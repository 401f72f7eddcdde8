//! Configuration management for the agricultural monitoring server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with AGRI_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{PlaceholderPolicy, Schema};

use crate::services::DataSources;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Input CSV locations
    pub data: DataSources,

    /// Fill policy for missing water-stress / temperature columns
    #[serde(default)]
    pub placeholder: PlaceholderPolicy,

    /// Column-name overrides
    #[serde(default)]
    pub columns: Schema,

    /// Map layer settings
    pub map: MapConfig,

    /// Parcel whose yield trend is logged at startup
    pub report_parcel: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    /// Upper bound of the yield colour scale (t/ha)
    pub yield_scale_max: f64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("AGRI_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let server = ServerConfig::default();
        let map = MapConfig::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", i64::from(server.port))?
            .set_default("server.host", server.host)?
            .set_default("data.monitoring", "data/monitoring_cultures.csv")?
            .set_default("data.weather", "data/meteo_detaillee.csv")?
            .set_default("data.soil", "data/sols.csv")?
            .set_default("data.yield_history", "data/historique_rendements.csv")?
            .set_default("placeholder.mode", "seeded")?
            .set_default("placeholder.seed", 42)?
            .set_default("map.yield_scale_max", map.yield_scale_max)?
            .set_default("report_parcel", "P001")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (AGRI_ prefix)
            .add_source(
                Environment::with_prefix("AGRI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            yield_scale_max: 12.0,
        }
    }
}
