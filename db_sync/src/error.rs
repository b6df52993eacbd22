//! Error types for db_sync

use thiserror::Error;

/// Result type for db_sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for db_sync
///
/// Every kind except `StatementExecution` is fatal to the phase that raised
/// it. Statement failures are recorded by the executor and never propagated.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Metadata query error: {0}")]
    MetadataQuery(String),

    #[error("Definition fetch error: {0}")]
    DefinitionFetch(String),

    #[error("Statement execution error: {0}")]
    StatementExecution(String),

    #[error("Verification query error: {0}")]
    VerificationQuery(#[source] Box<Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Wrap a driver error raised while reading metadata or rows
    pub fn metadata(context: impl std::fmt::Display, error: impl std::fmt::Display) -> Self {
        Error::MetadataQuery(format!("{}: {}", context, error))
    }
}

/// Convert Serde JSON errors to db_sync errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

/// Convert TOML deserialization errors to db_sync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}

/// Convert YAML deserialization errors to db_sync errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::Config(error.to_string())
    }
}
