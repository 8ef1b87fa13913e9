//! askdb Test Utilities
//!
//! Centralized test infrastructure for the askdb workspace:
//! - An in-memory data access service with scripted query responses
//! - Scripted completion providers (re-exported from askdb-llm)
//! - Fixtures for the parts-catalog scenarios
//! - Proptest generators and custom assertions

pub use askdb_catalog::{DataAccess, QueryResponse, SchemaCatalog};
pub use askdb_core::{
    AskConfig, AskError, AskResult, CatalogError, Column, CompletionConfig, DataAccessConfig,
    DataAccessError, DialectKind, ExecutionOutcome, FailureCause, FewShotExample, LlmError, PipelineConfig,
    PipelineError, PipelineResult, Row, StageModels, TableSchema,
};
pub use askdb_llm::{MockCompletionProvider, ProviderRegistry};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// IN-MEMORY DATA ACCESS
// ============================================================================

type QueryResponder = dyn Fn(&str) -> QueryResponse + Send + Sync;

/// In-memory [`DataAccess`] for tests.
///
/// Query answers come from a script first, then from an optional responder.
/// With neither, every query succeeds with no rows. All submitted queries are
/// recorded.
pub struct InMemoryDataAccess {
    tables: Vec<String>,
    columns: HashMap<String, Vec<Column>>,
    script: Mutex<VecDeque<Result<QueryResponse, DataAccessError>>>,
    responder: Option<Box<QueryResponder>>,
    unreachable: bool,
    queries: Mutex<Vec<String>>,
    table_calls: AtomicUsize,
    column_calls: AtomicUsize,
}

impl InMemoryDataAccess {
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            columns: HashMap::new(),
            script: Mutex::new(VecDeque::new()),
            responder: None,
            unreachable: false,
            queries: Mutex::new(Vec::new()),
            table_calls: AtomicUsize::new(0),
            column_calls: AtomicUsize::new(0),
        }
    }

    /// Add a table with its columns.
    pub fn with_table(mut self, name: impl Into<String>, columns: Vec<Column>) -> Self {
        let name = name.into();
        self.tables.push(name.clone());
        self.columns.insert(name, columns);
        self
    }

    /// Every call fails with a transport error.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Answer unscripted queries through `responder`.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> QueryResponse + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Script the next query to succeed with `rows`.
    pub fn then_rows(self, rows: Vec<Row>) -> Self {
        self.push(Ok(QueryResponse::Rows(rows)))
    }

    /// Script the next query to be rejected by the store with `message`.
    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.push(Ok(QueryResponse::Error(message.into())))
    }

    /// Script the next query to fail in transport.
    pub fn then_transport_failure(self, error: DataAccessError) -> Self {
        self.push(Err(error))
    }

    fn push(self, response: Result<QueryResponse, DataAccessError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
        self
    }

    /// Queries submitted so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn query_calls(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn table_calls(&self) -> usize {
        self.table_calls.load(Ordering::SeqCst)
    }

    pub fn column_calls(&self) -> usize {
        self.column_calls.load(Ordering::SeqCst)
    }

    fn refused(&self, endpoint: &str) -> DataAccessError {
        DataAccessError::Transport {
            endpoint: endpoint.to_string(),
            reason: "connection refused".to_string(),
        }
    }
}

impl Default for InMemoryDataAccess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataAccess for InMemoryDataAccess {
    async fn list_tables(&self) -> Result<Vec<String>, DataAccessError> {
        self.table_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(self.refused("/tables"));
        }
        Ok(self.tables.clone())
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>, DataAccessError> {
        self.column_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(self.refused("/columns"));
        }
        self.columns
            .get(table)
            .cloned()
            .ok_or_else(|| DataAccessError::Upstream {
                message: format!("table {} not found", table),
            })
    }

    async fn query(&self, sql: &str) -> Result<QueryResponse, DataAccessError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(sql.to_string());
        }
        if self.unreachable {
            return Err(self.refused("/query"));
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match (scripted, &self.responder) {
            (Some(response), _) => response,
            (None, Some(responder)) => Ok(responder(sql)),
            (None, None) => Ok(QueryResponse::Rows(Vec::new())),
        }
    }
}

impl std::fmt::Debug for InMemoryDataAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDataAccess")
            .field("tables", &self.tables)
            .field("query_calls", &self.query_calls())
            .finish()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for askdb types.

    use super::*;
    use proptest::prelude::*;

    /// Table names as Access reports them, spaces and underscores included.
    pub fn arb_table_name() -> impl Strategy<Value = String> {
        "[A-Z][A-Za-z0-9_ ]{0,24}[A-Za-z0-9]".prop_map(|s| s.to_string())
    }

    /// A set of distinct table names.
    pub fn arb_table_set(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(arb_table_name(), 1..=max)
            .prop_map(|set| set.into_iter().collect())
    }

    pub fn arb_type_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("VARCHAR".to_string()),
            Just("INTEGER".to_string()),
            Just("DATETIME".to_string()),
            Just("CURRENCY".to_string()),
            Just("BIT".to_string()),
            Just("LONGCHAR".to_string()),
        ]
    }

    pub fn arb_column() -> impl Strategy<Value = Column> {
        (
            "[a-z][a-z0-9_]{0,15}",
            arb_type_name(),
            proptest::option::of(1i64..=255),
            proptest::option::of(any::<bool>()),
            proptest::option::of("[A-Za-z ]{1,30}"),
        )
            .prop_map(|(name, type_name, size, nullable, description)| Column {
                name,
                type_name,
                size,
                nullable,
                description,
            })
    }

    pub fn arb_table_schema() -> impl Strategy<Value = TableSchema> {
        (arb_table_name(), prop::collection::vec(arb_column(), 1..8))
            .prop_map(|(name, columns)| TableSchema::new(name, columns))
    }

    /// A single-line query wrapped the ways completion models tend to wrap it.
    pub fn arb_wrapped_query() -> impl Strategy<Value = (String, String)> {
        let query = "SELECT TOP [1-9] \\[[a-z]{1,8}\\] FROM \\[[A-Za-z_]{1,12}\\]";
        (query, 0usize..6).prop_map(|(query, style)| {
            let wrapped = match style {
                0 => format!("```sql\n{}\n```", query),
                1 => format!("<think>\nlooking at the schema\n</think>\n```\n{}\n```", query),
                2 => format!("SQL: {}<|eot_id|>", query),
                3 => format!("Here is the query:\n```sql\n{}\n```\nIt lists rows.", query),
                4 => format!("```{}```", query),
                _ => format!("`{}`", query),
            };
            (query, wrapped)
        })
    }

    /// Error texts in the shapes the Access ODBC driver produces, paired with
    /// the cause they indicate.
    pub fn arb_store_error() -> impl Strategy<Value = (String, FailureCause)> {
        prop_oneof![
            "col_[a-z]{1,6}".prop_map(|c| (format!("no such column [{}]", c), FailureCause::ColumnMismatch)),
            "tbl_[A-Za-z]{1,6}".prop_map(|t| (
                format!(
                    "[Microsoft][ODBC Microsoft Access Driver] The Microsoft Access database engine cannot find the input table or query '{}'.",
                    t
                ),
                FailureCause::TableMismatch,
            )),
            "[1-4]".prop_map(|n| (
                format!("[Microsoft][ODBC Microsoft Access Driver] Too few parameters. Expected {}.", n),
                FailureCause::ColumnMismatch,
            )),
            Just((
                "[Microsoft][ODBC Microsoft Access Driver] Syntax error in FROM clause.".to_string(),
                FailureCause::Syntax,
            )),
            Just((
                "[Microsoft][ODBC Microsoft Access Driver] JOIN expression not supported.".to_string(),
                FailureCause::JoinCondition,
            )),
            Just((
                "Data type mismatch in criteria expression.".to_string(),
                FailureCause::TypeMismatch,
            )),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Fixtures built around a small auto-parts catalog.

    use super::*;
    use serde_json::json;

    pub const ACES_TABLE: &str = "ProductApplication_ACES";
    pub const PARTS_TABLE: &str = "Parts";

    pub fn aces_columns() -> Vec<Column> {
        vec![
            Column::new("item_id", "VARCHAR")
                .with_size(20)
                .with_nullable(false)
                .with_description("Part number"),
            Column::new("make", "VARCHAR").with_size(50),
            Column::new("model", "VARCHAR").with_size(50),
            Column::new("year", "INTEGER"),
        ]
    }

    pub fn parts_columns() -> Vec<Column> {
        vec![
            Column::new("item_id", "VARCHAR").with_size(20).with_nullable(false),
            Column::new("description", "LONGCHAR"),
            Column::new("list_price", "CURRENCY"),
        ]
    }

    /// Parts catalog with an Access system table alongside the real ones.
    pub fn parts_catalog() -> InMemoryDataAccess {
        InMemoryDataAccess::new()
            .with_table("MSysObjects", vec![Column::new("Id", "INTEGER")])
            .with_table(ACES_TABLE, aces_columns())
            .with_table(PARTS_TABLE, parts_columns())
    }

    pub fn model_rows() -> Vec<Row> {
        vec![vec![json!("Civic")], vec![json!("Accord")], vec![json!("CR-V")]]
    }

    pub fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            database_name: "BizLibrary".to_string(),
            ..PipelineConfig::reference()
        }
    }

    pub fn minimal_config() -> AskConfig {
        AskConfig {
            data_access: DataAccessConfig {
                base_url: "http://localhost:8001".to_string(),
                request_timeout_ms: 30_000,
                excluded_table_prefixes: vec!["MSys".to_string()],
            },
            completion: CompletionConfig {
                provider: "ollama".to_string(),
                endpoint: "http://localhost:11434".to_string(),
                model: "deepseek-r1".to_string(),
                api_key: None,
                request_timeout_ms: 120_000,
                temperature: 0.0,
                max_tokens: 1024,
                requests_per_minute: 60,
                stage_models: StageModels::default(),
            },
            pipeline: pipeline_config(),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for askdb-specific invariants.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &AskResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_synthesis_failed<T: std::fmt::Debug>(result: &AskResult<T>) {
        match result {
            Err(AskError::Pipeline(PipelineError::SynthesisFailed { .. })) => {}
            other => panic!("Expected SynthesisFailed, got: {:?}", other),
        }
    }

    /// Attempt-count invariants every finished pipeline result must hold.
    #[track_caller]
    pub fn assert_attempt_invariants(result: &PipelineResult) {
        assert!(
            result.retry_count <= result.max_attempts,
            "retry_count {} exceeds max_attempts {}",
            result.retry_count,
            result.max_attempts
        );
        if matches!(result.outcome, Some(ExecutionOutcome::Failure { .. })) {
            assert_eq!(
                result.retry_count, result.max_attempts,
                "a failed final outcome must exhaust every attempt"
            );
        }
        let executed = result.attempts.iter().filter(|a| a.outcome.is_some()).count() as u32;
        assert_eq!(executed, result.retry_count, "retry_count must equal executed attempts");
        for (index, attempt) in result.attempts.iter().enumerate() {
            assert_eq!(attempt.attempt as usize, index + 1, "attempt numbers must be 1-based and dense");
        }
    }

    /// Every selected table belongs to `known`.
    #[track_caller]
    pub fn assert_tables_known(selected: &[String], known: &[String]) {
        for table in selected {
            assert!(known.contains(table), "selected table {} is not in the catalog", table);
        }
    }

    #[track_caller]
    pub fn assert_config_valid(config: &AskConfig) {
        if let Err(e) = config.validate() {
            panic!("Config validation failed: {:?}", e);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_minimal_config_is_valid() {
        assertions::assert_config_valid(&fixtures::minimal_config());
    }

    #[tokio::test]
    async fn test_in_memory_script_then_default() {
        let access = InMemoryDataAccess::new()
            .then_error("no such column [model_x]")
            .then_rows(fixtures::model_rows());

        assert_eq!(
            access.query("a").await.unwrap(),
            QueryResponse::Error("no such column [model_x]".to_string())
        );
        assert!(matches!(access.query("b").await.unwrap(), QueryResponse::Rows(rows) if rows.len() == 3));
        assert_eq!(access.query("c").await.unwrap(), QueryResponse::Rows(Vec::new()));
        assert_eq!(access.queries(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_in_memory_responder() {
        let access = InMemoryDataAccess::new().with_responder(|sql| {
            if sql.contains("model_x") {
                QueryResponse::Error("no such column".to_string())
            } else {
                QueryResponse::Rows(vec![vec![serde_json::json!(1)]])
            }
        });
        assert!(matches!(access.query("SELECT [model_x]").await.unwrap(), QueryResponse::Error(_)));
        assert!(matches!(access.query("SELECT [model]").await.unwrap(), QueryResponse::Rows(_)));
    }

    #[tokio::test]
    async fn test_unreachable_access() {
        let access = fixtures::parts_catalog().unreachable();
        assert!(access.list_tables().await.is_err());
        assert!(access.query("SELECT 1").await.is_err());
        assert_eq!(access.table_calls(), 1);
    }

    #[tokio::test]
    async fn test_parts_catalog_fixture() {
        let access = fixtures::parts_catalog();
        let tables = access.list_tables().await.unwrap();
        assert_eq!(tables, vec!["MSysObjects", fixtures::ACES_TABLE, fixtures::PARTS_TABLE]);
        assert_eq!(access.columns(fixtures::ACES_TABLE).await.unwrap().len(), 4);
        assert!(access.columns("Missing").await.is_err());
    }

    #[test]
    fn test_attempt_invariants_accept_empty_result() {
        assertions::assert_attempt_invariants(&PipelineResult::new("q", 3));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_table_names_are_trimmed(name in generators::arb_table_name()) {
            prop_assert_eq!(name.trim(), name.as_str());
        }

        #[test]
        fn prop_table_set_is_distinct(tables in generators::arb_table_set(6)) {
            let mut sorted = tables.clone();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), tables.len());
        }
    }
}
