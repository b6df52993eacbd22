//! Database connection handling
//!
//! This module provides functionality to establish and manage MySQL
//! connections for the source and target databases.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{Executor, MySqlPool};
use std::time::Duration;

use crate::config::{ConnectionConfig, DatabaseConfig};
use crate::db::executor::StatementTarget;
use crate::error::{Error, Result};

/// A pooled connection to one MySQL database
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: MySqlPool,
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig, settings: &ConnectionConfig) -> Result<Self> {
        let pool_size = settings.pool_size.unwrap_or(5);
        let timeout_seconds = settings.timeout_seconds.unwrap_or(30);

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port())
            .username(&config.username)
            .password(&config.password)
            .database(&config.database)
            .charset(config.charset());

        let pool = MySqlPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(timeout_seconds))
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::Connectivity(format!(
                    "Failed to connect to {}: {}",
                    config.display_address(),
                    e
                ))
            })?;

        tracing::info!(address = %config.display_address(), "Connected to database");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StatementTarget for DatabaseConnection {
    async fn execute(&self, sql: &str) -> Result<()> {
        self.pool
            .execute(sql)
            .await
            .map(|_| ())
            .map_err(|e| Error::StatementExecution(e.to_string()))
    }
}
