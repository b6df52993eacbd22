//! db_sync: brings a target MySQL database in line with a source database
//!
//! The pipeline has four stages: compare both databases, generate the
//! statements that close the gap, apply them to the target one by one, and
//! verify by comparing again.

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::DatabaseConnection;
pub use db::executor::{ExecutionLog, ExecutionResult, ExecutionSummary, Executor, TracingLog};
pub use error::{Error, Result};
pub use schema::analyzer::{MetadataProvider, SchemaAnalyzer};
pub use schema::comparator::Comparator;
pub use schema::diff::Difference;
pub use schema::generator::StatementGenerator;
pub use schema::verifier::{Verification, Verifier};

/// Initialize db_sync with the specified configuration file
pub async fn init(config_path: &str) -> Result<SyncClient> {
    let config = config::load_from_file(config_path)?;
    SyncClient::new(config).await
}

/// The main client driving a source/target synchronization
pub struct SyncClient {
    config: Config,
    source: SchemaAnalyzer,
    target: SchemaAnalyzer,
}

impl SyncClient {
    /// Connect to both databases; either failing aborts before any comparison
    pub async fn new(config: Config) -> Result<Self> {
        tracing::info!(address = %config.source.display_address(), "Connecting to source database");
        let source = DatabaseConnection::connect(&config.source, &config.connection).await?;

        tracing::info!(address = %config.target.display_address(), "Connecting to target database");
        let target = DatabaseConnection::connect(&config.target, &config.connection).await?;

        Ok(Self {
            config,
            source: SchemaAnalyzer::new(source),
            target: SchemaAnalyzer::new(target),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn comparator(&self) -> Comparator<'_> {
        Comparator::new(&self.source, &self.target)
    }

    /// Compare source and target
    pub async fn compare(&self) -> Result<Difference> {
        self.comparator()
            .compare(&self.config.sync_data_tables)
            .await
    }

    /// Generate the statements for a difference
    pub async fn generate_statements(&self, diff: &Difference) -> Result<Vec<String>> {
        StatementGenerator::new(&self.source).generate(diff).await
    }

    /// Apply statements to the target, logging each one through `log`
    pub async fn apply_statements(
        &self,
        statements: &[String],
        log: &dyn ExecutionLog,
    ) -> Vec<ExecutionResult> {
        Executor::new(self.target.connection(), log)
            .apply(statements)
            .await
    }

    /// Compare again and report residual drift
    pub async fn verify(&self) -> Result<Verification> {
        Verifier::new(self.comparator())
            .verify(&self.config.sync_data_tables)
            .await
    }

    /// Close both connection pools
    pub async fn close(&self) {
        self.source.connection().close().await;
        self.target.connection().close().await;
    }
}
