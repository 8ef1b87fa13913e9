//! askdb core
//!
//! Data model, SQL dialect policy, error taxonomy and configuration shared by
//! every askdb crate. Nothing in here performs IO beyond reading a config file.

pub mod audit;
pub mod config;
pub mod diagnosis;
pub mod dialect;
pub mod error;
pub mod llm;
pub mod schema;
pub mod text;

pub use audit::{AttemptRecord, ExecutionOutcome, PipelineResult, PriorFailure, RetryState, Row};
pub use config::{
    AskConfig, CompletionConfig, DataAccessConfig, FewShotExample, PipelineConfig, StageModels,
    CONFIG_ENV_VAR,
};
pub use diagnosis::{classify_failure, FailureCause};
pub use dialect::{AccessDialect, DialectKind, SqlDialect};
pub use error::{
    AskError, AskResult, CatalogError, ConfigError, DataAccessError, LlmError, PipelineError,
};
pub use llm::{ChatMessage, ChatRole, Completion, CompletionRequest, Stage, TokenUsage};
pub use schema::{Column, TableSchema};
