//! Configuration handling for db_sync

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

const DEFAULT_PORT: u16 = 3306;
const DEFAULT_CHARSET: &str = "utf8mb4";

/// Load configuration from a TOML or YAML file
///
/// The format is picked from the extension: `.yaml`/`.yml` are read as YAML,
/// anything else as TOML. The loaded configuration is validated before it is
/// returned.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );

    let mut config: Config = if is_yaml {
        serde_yaml::from_str(&config_str)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?
    } else {
        toml::from_str(&config_str)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?
    };

    config.validate()?;
    Ok(config)
}

/// Represents the complete db_sync configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub source: DatabaseConfig,
    pub target: DatabaseConfig,
    /// Tables whose rows are compared and synchronized; all other tables only
    /// get structural treatment
    #[serde(default)]
    pub sync_data_tables: Vec<String>,
    #[serde(default)]
    pub connection: ConnectionConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Check required fields and fill in defaults
    pub fn validate(&mut self) -> Result<()> {
        self.source.validate("source")?;
        self.target.validate("target")?;
        Ok(())
    }
}

/// Connection parameters for one MySQL database
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub charset: Option<String>,
}

impl DatabaseConfig {
    fn validate(&mut self, side: &str) -> Result<()> {
        if self.host.trim().is_empty() || self.database.trim().is_empty() {
            return Err(Error::Config(format!(
                "{} database config is incomplete: host and database are required",
                side
            )));
        }
        self.port.get_or_insert(DEFAULT_PORT);
        self.charset.get_or_insert_with(|| DEFAULT_CHARSET.to_string());
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn charset(&self) -> &str {
        self.charset.as_deref().unwrap_or(DEFAULT_CHARSET)
    }

    /// `host:port/database`, safe to log
    pub fn display_address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port(), self.database)
    }
}

/// Pool settings shared by both connections
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: Some(5),
            timeout_seconds: Some(30),
        }
    }
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub stdout: bool,
}

fn default_log_format() -> String {
    "text".to_string()
}
