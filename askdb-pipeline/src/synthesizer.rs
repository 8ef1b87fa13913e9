//! SQL synthesis: question + schemas (+ previous failure) → one query.

use crate::prompt::{complete_text, GenerationParams};
use askdb_core::text::clean_sql;
use askdb_core::{
    AskResult, ChatMessage, CompletionRequest, FewShotExample, PipelineError, PriorFailure,
    SqlDialect, TableSchema,
};
use askdb_llm::{CompletionProvider, UsageTracker};
use std::fmt::Write as _;
use std::sync::Arc;

pub struct SqlSynthesizer {
    provider: Arc<dyn CompletionProvider>,
    dialect: &'static dyn SqlDialect,
    row_cap: u32,
    examples: Vec<FewShotExample>,
    params: GenerationParams,
}

impl SqlSynthesizer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        dialect: &'static dyn SqlDialect,
        row_cap: u32,
        params: GenerationParams,
    ) -> Self {
        Self {
            provider,
            dialect,
            row_cap,
            examples: Vec::new(),
            params,
        }
    }

    pub fn with_examples(mut self, examples: Vec<FewShotExample>) -> Self {
        self.examples = examples;
        self
    }

    /// Produce one single-line query for `question`.
    ///
    /// # Errors
    /// * `PipelineError::SynthesisFailed` - the completion was empty or held no query
    /// * `AskError::Llm` - the completion call itself failed
    #[tracing::instrument(skip_all, fields(tables = ?tables, repair = prior.is_some()))]
    pub async fn synthesize(
        &self,
        tables: &[String],
        schemas: &[TableSchema],
        question: &str,
        prior: Option<&PriorFailure>,
        usage: &UsageTracker,
    ) -> AskResult<String> {
        let request = self.params.apply(self.build_request(tables, schemas, question, prior));
        let raw = complete_text(self.provider.as_ref(), &request, usage).await?;

        if raw.trim().is_empty() {
            return Err(PipelineError::SynthesisFailed {
                reason: "completion was empty".to_string(),
            }
            .into());
        }

        let query = clean_sql(&raw).ok_or_else(|| PipelineError::SynthesisFailed {
            reason: "completion contained no query".to_string(),
        })?;
        tracing::debug!(query = %query, "query synthesized");
        Ok(query)
    }

    fn build_request(
        &self,
        tables: &[String],
        schemas: &[TableSchema],
        question: &str,
        prior: Option<&PriorFailure>,
    ) -> CompletionRequest {
        let mut system = format!(
            "You are a helpful assistant writing {} queries.\n\
             Given an input question, create one syntactically correct query to run.\n\
             You can order the results by a relevant column to return the most interesting rows.\n\
             Use only the tables and columns listed below, and pay attention to which column is in which table.\n\n\
             Rules:",
            self.dialect.name()
        );
        for (idx, rule) in self.dialect.rules(self.row_cap).iter().enumerate() {
            let _ = write!(system, "\n{}. {}", idx + 1, rule);
        }

        let _ = write!(system, "\n\nOnly use the following tables ({}):", tables.join(", "));
        for schema in schemas {
            system.push_str("\n\n");
            system.push_str(&schema.prompt_block());
        }

        if !self.examples.is_empty() {
            system.push_str("\n\nExamples:");
            for example in &self.examples {
                let _ = write!(
                    system,
                    "\n\nQuestion: {}\nSQL: {}",
                    example.question, example.query
                );
                if let Some(explanation) = &example.explanation {
                    let _ = write!(system, "\n({})", explanation);
                }
            }
        }

        system.push_str("\n\nReturn only the SQL query on a single line, without explanation or formatting.");

        let mut user = format!("Question: {}", question);
        if let Some(prior) = prior {
            let _ = write!(
                user,
                "\n\nThe previous query failed.\nPrevious query: {}\nError: {}\n\
                 Write a corrected query that avoids this error.",
                prior.query, prior.error
            );
        }

        CompletionRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }
}

impl std::fmt::Debug for SqlSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSynthesizer")
            .field("dialect", &self.dialect.name())
            .field("row_cap", &self.row_cap)
            .field("examples", &self.examples.len())
            .field("model", &self.provider.model_id())
            .finish()
    }
}
