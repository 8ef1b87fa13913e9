//! Error types for askdb operations

use thiserror::Error;

/// Errors raised while talking to the data access service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataAccessError {
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Request to {endpoint} returned status {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("Data store reported an error: {message}")]
    Upstream { message: String },

    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },
}

/// Schema catalog errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Schema catalog unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Unknown table: {table}")]
    UnknownTable { table: String },
}

impl From<DataAccessError> for CatalogError {
    fn from(err: DataAccessError) -> Self {
        Self::Unavailable {
            reason: err.to_string(),
        }
    }
}

/// Text completion provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No completion provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },
}

/// Failures of the question-to-answer pipeline itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Cannot identify relevant data for this question")]
    NoRelevantTable,

    #[error("SQL synthesis failed: {reason}")]
    SynthesisFailed { reason: String },

    #[error("Query execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("All {attempts} attempts failed; last query `{last_query}` failed with: {last_error}")]
    RetryExhausted {
        attempts: u32,
        last_query: String,
        last_error: String,
    },

    #[error("Summary unavailable: {reason}")]
    SummaryUnavailable { reason: String },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or ASKDB_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Provider not supported: {provider}")]
    ProviderNotSupported { provider: String },
}

/// Master error type for all askdb errors.
#[derive(Debug, Clone, Error)]
pub enum AskError {
    #[error("Data access error: {0}")]
    DataAccess(#[from] DataAccessError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<ConfigError> for AskError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl AskError {
    /// Whether the pipeline may continue after this error.
    ///
    /// Only execution failures (fed back into the retry loop) and a missing
    /// summary are recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AskError::Pipeline(PipelineError::ExecutionFailed { .. })
                | AskError::Pipeline(PipelineError::SummaryUnavailable { .. })
        )
    }
}

/// Result type alias for askdb operations.
pub type AskResult<T> = Result<T, AskError>;

// =============================================================================
// TESTS
// =============================================================================
