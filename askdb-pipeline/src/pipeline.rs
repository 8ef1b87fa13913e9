//! The question-to-answer pipeline.
//!
//! question → table selection → synthesize/execute rounds → summary.
//! A run never returns an error: failures are recorded on the
//! [`PipelineResult`] next to whatever was computed before them.

use crate::executor::QueryExecutor;
use crate::prompt::GenerationParams;
use crate::retry::RetryController;
use crate::selector::TableSelector;
use crate::summarizer::ResultSummarizer;
use crate::synthesizer::SqlSynthesizer;
use askdb_catalog::{DataAccess, HttpDataAccess, SchemaCatalog};
use askdb_core::{
    classify_failure, AskConfig, AskError, AskResult, PipelineConfig, PipelineError,
    PipelineResult, RetryState, Stage,
};
use askdb_llm::{ProviderRegistry, UsageTracker};
use futures_util::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;

pub struct Pipeline {
    catalog: Arc<SchemaCatalog>,
    registry: Arc<ProviderRegistry>,
    executor: QueryExecutor,
    config: PipelineConfig,
    params: GenerationParams,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        registry: Arc<ProviderRegistry>,
        executor: QueryExecutor,
        config: PipelineConfig,
    ) -> Self {
        Self {
            catalog,
            registry,
            executor,
            config,
            params: GenerationParams::default(),
        }
    }

    pub fn with_generation_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Wire the HTTP data access client, catalog and providers from config.
    pub fn from_config(config: &AskConfig) -> AskResult<Self> {
        let access: Arc<dyn DataAccess> = Arc::new(HttpDataAccess::from_config(&config.data_access)?);
        let catalog = Arc::new(SchemaCatalog::from_config(Arc::clone(&access), &config.data_access));
        let registry = Arc::new(ProviderRegistry::from_config(config)?);
        let executor = QueryExecutor::new(access, config.data_access.request_timeout());

        Ok(Self::new(catalog, registry, executor, config.pipeline.clone())
            .with_generation_params(GenerationParams::from_config(&config.completion)))
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer one question.
    #[tracing::instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn answer(&self, question: &str) -> PipelineResult {
        let clock = Instant::now();
        let usage = UsageTracker::new();
        let mut result = PipelineResult::new(question, self.config.max_attempts.max(1));
        tracing::Span::current().record("request_id", tracing::field::display(result.request_id));

        if let Err(err) = self.run(&mut result, &usage).await {
            tracing::warn!(error = %err, "pipeline ended without an answer");
            result.error = Some(err);
        }

        result.usage = usage.usage();
        result.elapsed_ms = clock.elapsed().as_millis() as u64;
        tracing::info!(
            success = result.is_success(),
            attempts = result.retry_count,
            tokens = result.usage.total(),
            elapsed_ms = result.elapsed_ms,
            "question answered"
        );
        result
    }

    async fn run(&self, result: &mut PipelineResult, usage: &UsageTracker) -> AskResult<()> {
        let available = self.catalog.tables().await?;

        let selector = TableSelector::new(self.registry.provider(Stage::TableSelection)?, self.params)
            .with_case_insensitive_matching(self.config.case_insensitive_tables);
        result.tables = selector.select(&result.question, &available, usage).await?;
        if result.tables.is_empty() {
            return Err(PipelineError::NoRelevantTable.into());
        }

        let schemas = try_join_all(result.tables.iter().map(|table| self.catalog.schema(table))).await?;

        let synthesizer = SqlSynthesizer::new(
            self.registry.provider(Stage::Synthesis)?,
            self.config.dialect.dialect(),
            self.config.default_row_cap,
            self.params,
        )
        .with_examples(self.config.few_shot_examples.clone());

        let report = RetryController::new(self.config.max_attempts)
            .run(
                &synthesizer,
                &self.executor,
                &result.question,
                &result.tables,
                &schemas,
                usage,
            )
            .await;

        result.retry_count = report.executions;
        result.attempts = report.attempts;
        result.query = report.last_query;
        result.failure_cause = report
            .last_outcome
            .as_ref()
            .and_then(|outcome| outcome.error())
            .map(classify_failure);

        // A synthesis failure leaves no final outcome: the last executed one
        // stays visible in the attempt trail only.
        let exhausted_by_execution = matches!(
            report.error,
            Some(AskError::Pipeline(PipelineError::RetryExhausted { .. }))
        );
        if report.state == RetryState::Succeeded || exhausted_by_execution {
            result.outcome = report.last_outcome;
        }

        if self.config.summarize {
            self.summarize(result, usage).await;
        }

        match report.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn summarize(&self, result: &mut PipelineResult, usage: &UsageTracker) {
        let Some(outcome) = result.outcome.as_ref() else {
            return;
        };
        let provider = match self.registry.provider(Stage::Summary) {
            Ok(provider) => provider,
            Err(err) => {
                tracing::warn!(error = %err, "no summary provider");
                return;
            }
        };

        let summarizer = ResultSummarizer::new(provider, self.config.summary_row_limit, self.params);
        result.summary = summarizer
            .summarize(
                &result.question,
                &result.tables,
                result.query.as_deref(),
                outcome,
                usage,
            )
            .await;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("executor", &self.executor)
            .field("max_attempts", &self.config.max_attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_test_utils::assertions::assert_ok;
    use askdb_test_utils::fixtures;

    #[test]
    fn test_from_config_builds_pipeline() {
        let built = Pipeline::from_config(&fixtures::minimal_config());
        assert_ok(&built);
        let pipeline = built.unwrap();
        assert_eq!(pipeline.config().max_attempts, 3);
        assert_eq!(pipeline.params.max_tokens, Some(1024));
    }

    #[test]
    fn test_from_config_rejects_bad_data_url() {
        let mut config = fixtures::minimal_config();
        config.data_access.base_url = "http//broken".to_string();
        assert!(matches!(
            Pipeline::from_config(&config),
            Err(AskError::DataAccess(_))
        ));
    }
}
