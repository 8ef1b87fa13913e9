//! HTTP client for the data access service.
//!
//! Endpoints:
//! - `GET /tables` → `{"tables": [...]}`
//! - `GET /columns/{table}` → `{"columns": [...]}` or `{"error": "..."}`
//! - `GET /query?q=...` → `{"result": [[...], ...]}` or `{"error": "..."}`

use crate::access::{DataAccess, QueryResponse};
use askdb_core::{Column, DataAccessConfig, DataAccessError, Row};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// reqwest-backed [`DataAccess`].
#[derive(Debug, Clone)]
pub struct HttpDataAccess {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpDataAccess {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DataAccessError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataAccessError::Transport {
                endpoint: base_url.to_string(),
                reason: e.to_string(),
            })?;

        let base_url =
            Url::parse(base_url.trim_end_matches('/')).map_err(|e| DataAccessError::Transport {
                endpoint: base_url.to_string(),
                reason: format!("invalid base URL: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn from_config(config: &DataAccessConfig) -> Result<Self, DataAccessError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, DataAccessError> {
        let endpoint = url.path().to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DataAccessError::Status {
                endpoint,
                status: status.as_u16(),
                message: upstream_message(&message).unwrap_or(message),
            });
        }

        response
            .json()
            .await
            .map_err(|e| DataAccessError::MalformedResponse {
                endpoint,
                reason: e.to_string(),
            })
    }

    fn transport_error(&self, endpoint: &str, err: reqwest::Error) -> DataAccessError {
        if err.is_timeout() {
            DataAccessError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            DataAccessError::Transport {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl DataAccess for HttpDataAccess {
    async fn list_tables(&self) -> Result<Vec<String>, DataAccessError> {
        let body: TablesBody = self.get_json(self.endpoint(&["tables"])).await?;
        match body {
            TablesBody::Tables { tables } => Ok(tables),
            TablesBody::Error { error } => Err(DataAccessError::Upstream { message: error }),
        }
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>, DataAccessError> {
        let body: ColumnsBody = self.get_json(self.endpoint(&["columns", table])).await?;
        match body {
            ColumnsBody::Columns { columns } => {
                Ok(columns.into_iter().map(ColumnWire::into_column).collect())
            }
            ColumnsBody::Error { error } => Err(DataAccessError::Upstream { message: error }),
        }
    }

    async fn query(&self, sql: &str) -> Result<QueryResponse, DataAccessError> {
        let mut url = self.endpoint(&["query"]);
        url.query_pairs_mut().append_pair("q", sql);

        let body: QueryBody = self.get_json(url).await?;
        Ok(match body {
            QueryBody::Result { result } => QueryResponse::Rows(result),
            QueryBody::Error { error } => QueryResponse::Error(error),
        })
    }
}

fn upstream_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "detail")]
        error: String,
    }
    serde_json::from_str::<ErrorBody>(body).ok().map(|e| e.error)
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TablesBody {
    Tables { tables: Vec<String> },
    Error { error: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColumnsBody {
    Columns { columns: Vec<ColumnWire> },
    Error { error: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryBody {
    Result { result: Vec<Row> },
    Error { error: String },
}

/// ODBC drivers report nullability as 0/1, newer services as a bool.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn as_bool(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i != 0,
        }
    }
}

/// The service has shipped three column encodings over time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColumnWire {
    Full(String, String, Option<i64>, Option<Flag>, Option<String>),
    Pair(String, String),
    Object {
        #[serde(alias = "column_name")]
        name: String,
        #[serde(alias = "type", alias = "data_type")]
        type_name: String,
        #[serde(default, alias = "column_size")]
        size: Option<i64>,
        #[serde(default)]
        nullable: Option<Flag>,
        #[serde(default, alias = "remarks")]
        description: Option<String>,
    },
}

impl ColumnWire {
    fn into_column(self) -> Column {
        let (name, type_name, size, nullable, description) = match self {
            ColumnWire::Full(name, type_name, size, nullable, description) => {
                (name, type_name, size, nullable, description)
            }
            ColumnWire::Pair(name, type_name) => (name, type_name, None, None, None),
            ColumnWire::Object {
                name,
                type_name,
                size,
                nullable,
                description,
            } => (name, type_name, size, nullable, description),
        };

        Column {
            name,
            type_name,
            size,
            nullable: nullable.map(|f| f.as_bool()),
            description: description.filter(|d| !d.trim().is_empty()),
        }
    }
}
