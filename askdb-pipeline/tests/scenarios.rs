//! End-to-end pipeline runs against in-memory collaborators.

use askdb_core::{AskError, CatalogError, ExecutionOutcome, FailureCause, LlmError, PipelineError, Stage};
use askdb_llm::{MockCompletionProvider, ProviderRegistry};
use askdb_pipeline::{render_markdown, Pipeline, QueryExecutor};
use askdb_test_utils::assertions::{assert_attempt_invariants, assert_tables_known};
use askdb_test_utils::{fixtures, InMemoryDataAccess, QueryResponse, SchemaCatalog};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const COUNT_QUERY: &str = "SELECT COUNT(*) FROM (SELECT DISTINCT [model] FROM [ProductApplication_ACES] WHERE [item_id] = '513001')";
const TOO_FEW_PARAMETERS: &str =
    "[Microsoft][ODBC Microsoft Access Driver] Too few parameters. Expected 1.";

struct Fixture {
    access: Arc<InMemoryDataAccess>,
    provider: Arc<MockCompletionProvider>,
    pipeline: Pipeline,
}

fn fixture(access: InMemoryDataAccess, provider: MockCompletionProvider) -> Fixture {
    let access = Arc::new(access);
    let provider = Arc::new(provider);
    let pipeline = build(access.clone(), ProviderRegistry::single(provider.clone()));
    Fixture {
        access,
        provider,
        pipeline,
    }
}

fn build(access: Arc<InMemoryDataAccess>, registry: ProviderRegistry) -> Pipeline {
    let catalog = SchemaCatalog::new(access.clone(), Duration::from_secs(5))
        .with_excluded_prefixes(vec!["MSys".to_string()]);
    Pipeline::new(
        Arc::new(catalog),
        Arc::new(registry),
        QueryExecutor::new(access, Duration::from_secs(5)),
        fixtures::pipeline_config(),
    )
}

/// Answers each stage by recognizing its prompt.
fn stage_aware_provider(sql: &'static str) -> MockCompletionProvider {
    MockCompletionProvider::from_fn(move |request| {
        let prompt = request.full_text();
        Ok(if prompt.contains("You decide which database tables") {
            fixtures::ACES_TABLE.to_string()
        } else if prompt.contains("Rules:") {
            sql.to_string()
        } else {
            "Three models fit.".to_string()
        })
    })
}

#[tokio::test]
async fn distinct_model_count_for_part() {
    let f = fixture(
        fixtures::parts_catalog().then_rows(vec![vec![json!(3)]]),
        MockCompletionProvider::scripted([
            fixtures::ACES_TABLE.to_string(),
            format!("<think>count distinct models</think>\n```sql\n{}\n```<|eot_id|>", COUNT_QUERY),
            "Three distinct car models fit part 513001.".to_string(),
        ]),
    );

    let result = f.pipeline.answer("how many distinct models fit part 513001").await;

    assert!(result.is_success(), "unexpected error: {:?}", result.error);
    assert_eq!(result.tables, vec![fixtures::ACES_TABLE.to_string()]);
    let query = result.query.as_deref().unwrap();
    assert_eq!(query, COUNT_QUERY);
    assert!(query.contains("DISTINCT [model]"));
    assert!(query.contains("[item_id] = '513001'"));
    assert_eq!(result.rows(), Some(&[vec![json!(3)]][..]));
    assert_eq!(result.retry_count, 1);
    assert_eq!(
        result.summary.as_deref(),
        Some("Three distinct car models fit part 513001.")
    );
    assert_eq!(f.access.queries(), vec![COUNT_QUERY.to_string()]);
    assert!(result.usage.total() > 0);
    assert_attempt_invariants(&result);

    let selection_prompt = f.provider.requests()[0].full_text();
    assert!(!selection_prompt.contains("MSysObjects"));
}

#[tokio::test]
async fn column_error_is_fed_back_into_second_synthesis() {
    let f = fixture(
        fixtures::parts_catalog()
            .then_error("no such column [model_x]")
            .then_rows(fixtures::model_rows()),
        MockCompletionProvider::scripted([
            fixtures::ACES_TABLE,
            "SELECT DISTINCT TOP 5 [model_x] FROM [ProductApplication_ACES] WHERE [item_id] = '513001'",
            "SELECT DISTINCT TOP 5 [model] FROM [ProductApplication_ACES] WHERE [item_id] = '513001'",
            "Civic, Accord and CR-V fit part 513001.",
        ]),
    );

    let result = f.pipeline.answer("which models fit part 513001").await;

    assert!(result.is_success());
    assert_eq!(result.retry_count, 2);
    assert!(f.access.query_calls() <= 3);
    assert_eq!(f.access.query_calls(), 2);

    let second_synthesis = &f.provider.requests()[2];
    assert!(second_synthesis.full_text().contains("no such column [model_x]"));
    assert_eq!(
        result.attempts[1].prior_error.as_deref(),
        Some("no such column [model_x]")
    );
    assert_attempt_invariants(&result);
}

#[tokio::test]
async fn empty_selection_stops_before_synthesis() {
    let f = fixture(
        fixtures::parts_catalog(),
        MockCompletionProvider::scripted(["NONE"]),
    );

    let result = f.pipeline.answer("what is the weather in Paris").await;

    assert!(matches!(
        result.error,
        Some(AskError::Pipeline(PipelineError::NoRelevantTable))
    ));
    assert!(result.tables.is_empty());
    assert_eq!(f.provider.call_count(), 1);
    assert_eq!(f.access.query_calls(), 0);
    assert_eq!(result.retry_count, 0);
    assert!(result.summary.is_none());
    assert_attempt_invariants(&result);
}

#[tokio::test]
async fn exhausted_retries_expose_last_query_and_cause() {
    let f = fixture(
        fixtures::parts_catalog()
            .with_responder(|_| QueryResponse::Error(TOO_FEW_PARAMETERS.to_string())),
        MockCompletionProvider::scripted([
            fixtures::ACES_TABLE,
            "SELECT [modl] FROM [ProductApplication_ACES]",
            "SELECT [mdl] FROM [ProductApplication_ACES]",
            "SELECT [model_name] FROM [ProductApplication_ACES]",
            "The query kept asking for a field the table does not have.",
        ]),
    );

    let result = f.pipeline.answer("list models for part 513001").await;

    assert_eq!(result.retry_count, 3);
    assert_eq!(
        result.query.as_deref(),
        Some("SELECT [model_name] FROM [ProductApplication_ACES]")
    );
    assert_eq!(result.last_error(), Some(TOO_FEW_PARAMETERS));
    match &result.error {
        Some(AskError::Pipeline(PipelineError::RetryExhausted {
            attempts,
            last_query,
            last_error,
        })) => {
            assert_eq!(*attempts, 3);
            assert_eq!(last_query, "SELECT [model_name] FROM [ProductApplication_ACES]");
            assert_eq!(last_error, TOO_FEW_PARAMETERS);
        }
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
    assert_eq!(result.failure_cause, Some(FailureCause::ColumnMismatch));
    let summary = result.summary.as_deref().unwrap();
    assert!(summary.to_lowercase().contains("column mismatch"));
    assert_eq!(f.provider.call_count(), 5);
    assert_eq!(f.access.query_calls(), 3);
    assert_attempt_invariants(&result);

    let rendered = render_markdown(&result);
    assert!(rendered.contains("Error after 3 attempts"));
    assert!(rendered.contains("SELECT [model_name] FROM [ProductApplication_ACES]"));
}

#[tokio::test]
async fn unreachable_catalog_aborts_before_any_completion() {
    let f = fixture(
        fixtures::parts_catalog().unreachable(),
        MockCompletionProvider::scripted(Vec::<String>::new()),
    );

    let result = f.pipeline.answer("which models fit part 513001").await;

    assert!(matches!(
        result.error,
        Some(AskError::Catalog(CatalogError::Unavailable { .. }))
    ));
    assert_eq!(f.provider.call_count(), 0);
    assert_eq!(f.access.query_calls(), 0);
}

#[tokio::test]
async fn synthesis_failure_keeps_partial_result() {
    let f = fixture(
        fixtures::parts_catalog().then_error("no such column [modl]"),
        MockCompletionProvider::scripted([
            fixtures::ACES_TABLE,
            "SELECT [modl] FROM [ProductApplication_ACES]",
            "<think>I am not sure</think>",
        ]),
    );

    let result = f.pipeline.answer("list models").await;

    assert!(matches!(
        result.error,
        Some(AskError::Pipeline(PipelineError::SynthesisFailed { .. }))
    ));
    assert_eq!(result.tables, vec![fixtures::ACES_TABLE.to_string()]);
    assert_eq!(
        result.query.as_deref(),
        Some("SELECT [modl] FROM [ProductApplication_ACES]")
    );
    assert!(result.outcome.is_none());
    assert_eq!(result.retry_count, 1);
    assert_eq!(result.attempts.len(), 2);
    assert!(result.summary.is_none());
    assert_eq!(f.provider.call_count(), 3);
    assert_attempt_invariants(&result);
}

#[tokio::test]
async fn summary_failure_is_not_fatal() {
    let f = fixture(
        fixtures::parts_catalog().then_rows(fixtures::model_rows()),
        MockCompletionProvider::scripted([
            fixtures::ACES_TABLE,
            "SELECT DISTINCT TOP 5 [model] FROM [ProductApplication_ACES]",
        ])
        .then_fail(LlmError::Timeout {
            provider: "mock".to_string(),
            timeout_ms: 120_000,
        }),
    );

    let result = f.pipeline.answer("which models").await;

    assert!(result.is_success());
    assert!(result.summary.is_none());
    assert_eq!(result.rows().map(|r| r.len()), Some(3));
}

#[tokio::test]
async fn summary_stage_uses_its_own_provider() {
    let access = Arc::new(fixtures::parts_catalog().then_rows(fixtures::model_rows()));
    let main = Arc::new(MockCompletionProvider::scripted([
        fixtures::ACES_TABLE,
        "SELECT DISTINCT TOP 5 [model] FROM [ProductApplication_ACES]",
    ]));
    let mut registry = ProviderRegistry::single(main.clone());
    registry.register_stage(
        Stage::Summary,
        Box::new(MockCompletionProvider::scripted(["Three models fit."]).with_model_id("small-model")),
    );
    assert!(registry.has_override(Stage::Summary));
    let pipeline = build(access, registry);

    let result = pipeline.answer("which models").await;

    assert_eq!(result.summary.as_deref(), Some("Three models fit."));
    assert_eq!(main.call_count(), 2);
}

#[tokio::test]
async fn repeated_questions_reuse_cached_columns() {
    let f = fixture(
        fixtures::parts_catalog(),
        stage_aware_provider("SELECT DISTINCT TOP 5 [model] FROM [ProductApplication_ACES]"),
    );

    let first = f.pipeline.answer("which models fit part 513001").await;
    let second = f.pipeline.answer("which models fit part 513002").await;

    assert!(first.is_success() && second.is_success());
    assert_eq!(f.access.table_calls(), 1);
    assert_eq!(f.access.column_calls(), 1);
    assert_ne!(first.request_id, second.request_id);
}

#[tokio::test]
async fn concurrent_questions_share_the_catalog() {
    let f = fixture(
        fixtures::parts_catalog(),
        stage_aware_provider("SELECT DISTINCT TOP 5 [model] FROM [ProductApplication_ACES]"),
    );
    f.pipeline.catalog().list_tables().await.unwrap();

    let (a, b) = tokio::join!(
        f.pipeline.answer("which models fit part 513001"),
        f.pipeline.answer("which models fit part 513002"),
    );

    assert!(a.is_success() && b.is_success());
    assert!(f.access.column_calls() <= 2);
    let known = f.pipeline.catalog().tables().await.unwrap();
    assert_tables_known(&a.tables, &known);
    assert_tables_known(&b.tables, &known);
}

#[tokio::test]
async fn result_serializes_as_audit_trail() {
    let f = fixture(
        fixtures::parts_catalog().then_rows(fixtures::model_rows()),
        stage_aware_provider("SELECT DISTINCT TOP 5 [model] FROM [ProductApplication_ACES]"),
    );

    let result = f.pipeline.answer("which models").await;
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["tables"], json!([fixtures::ACES_TABLE]));
    assert_eq!(value["outcome"]["status"], "success");
    assert_eq!(value["attempts"][0]["attempt"], 1);
    assert!(value["error"].is_null());
    assert!(matches!(result.outcome, Some(ExecutionOutcome::Success { .. })));
}
