//! Configuration types.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use crate::{ConfigError, DialectKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "ASKDB_CONFIG";

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AskConfig {
    pub data_access: DataAccessConfig,
    pub completion: CompletionConfig,
    pub pipeline: PipelineConfig,
}

/// Data access service endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataAccessConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Table-name prefixes hidden from the catalog (e.g. "MSys")
    pub excluded_table_prefixes: Vec<String>,
}

impl DataAccessConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Text completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionConfig {
    /// "ollama" or "openai"
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    /// Optional: only the OpenAI-compatible provider sends it
    #[serde(default)]
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: i32,
    pub requests_per_minute: u32,
    /// Optional per-stage model overrides
    #[serde(default)]
    pub stage_models: StageModels,
}

impl CompletionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Model overrides for individual pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageModels {
    pub table_selection: Option<String>,
    pub synthesis: Option<String>,
    pub summary: Option<String>,
}

/// Pipeline policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub dialect: DialectKind,
    pub max_attempts: u32,
    /// Rows requested when the question gives no count
    pub default_row_cap: u32,
    /// Accept selector output that matches a table name only case-insensitively
    pub case_insensitive_tables: bool,
    pub summarize: bool,
    /// Result rows included in the summary prompt
    pub summary_row_limit: usize,
    /// Name reported in schema snapshots
    pub database_name: String,
    /// Optional question/query pairs shown to the synthesizer
    #[serde(default)]
    pub few_shot_examples: Vec<FewShotExample>,
}

impl PipelineConfig {
    /// Reference policy: Access dialect, three attempts, five-row cap.
    pub fn reference() -> Self {
        Self {
            dialect: DialectKind::Access,
            max_attempts: 3,
            default_row_cap: 5,
            case_insensitive_tables: false,
            summarize: true,
            summary_row_limit: 50,
            database_name: "database".to_string(),
            few_shot_examples: FewShotExample::reference_examples(),
        }
    }
}

/// A worked question → query example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FewShotExample {
    pub question: String,
    pub tables_needed: Vec<String>,
    pub query: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl FewShotExample {
    pub fn reference_examples() -> Vec<Self> {
        vec![
            Self {
                question: "How many car models fit the part with item_id 513001?".to_string(),
                tables_needed: vec!["ProductApplication_ACES".to_string()],
                query: "SELECT COUNT(*) FROM (SELECT DISTINCT [model] FROM [ProductApplication_ACES] WHERE [item_id] = '513001')"
                    .to_string(),
                explanation: Some("Counts distinct car models for the specified part ID".to_string()),
            },
            Self {
                question: "What are the car models that fit part 513001?".to_string(),
                tables_needed: vec!["ProductApplication_ACES".to_string()],
                query: "SELECT DISTINCT TOP 5 [model] FROM [ProductApplication_ACES] WHERE [item_id] = '513001'"
                    .to_string(),
                explanation: Some("Lists car models that can use this part".to_string()),
            },
        ]
    }
}

const SUPPORTED_PROVIDERS: &[&str] = &["ollama", "openai"];

impl AskConfig {
    /// Read, parse and validate a TOML configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AskConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_access.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "data_access.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.data_access.base_url.starts_with("http://")
            && !self.data_access.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "data_access.base_url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.data_access.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "data_access.request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self
            .data_access
            .excluded_table_prefixes
            .iter()
            .any(|p| p.is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "data_access.excluded_table_prefixes",
                reason: "prefixes must not be empty (an empty prefix hides every table)".to_string(),
            });
        }
        if !SUPPORTED_PROVIDERS.contains(&self.completion.provider.as_str()) {
            return Err(ConfigError::ProviderNotSupported {
                provider: self.completion.provider.clone(),
            });
        }
        if self.completion.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "completion.endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "completion.model",
                reason: "must not be empty".to_string(),
            });
        }
        if self.completion.provider == "openai" && self.completion.api_key.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "completion.api_key",
                reason: "required for the openai provider".to_string(),
            });
        }
        if self.completion.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "completion.request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "completion.temperature",
                reason: "must be within 0.0..=2.0".to_string(),
            });
        }
        if self.completion.max_tokens <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "completion.max_tokens",
                reason: "must be > 0".to_string(),
            });
        }
        if self.completion.requests_per_minute == 0 {
            return Err(ConfigError::InvalidValue {
                field: "completion.requests_per_minute",
                reason: "must be > 0".to_string(),
            });
        }
        if self.pipeline.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.max_attempts",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.pipeline.default_row_cap == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.default_row_cap",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.pipeline.database_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.database_name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
