//! Error types for the command-line client.

use askdb_core::{AskError, CatalogError, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ask(#[from] AskError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to serialize snapshot: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Failed to init logging: {0}")]
    Logging(String),
}
