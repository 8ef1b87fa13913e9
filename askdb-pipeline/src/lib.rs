//! askdb pipeline
//!
//! Translates a natural-language question into a dialect-specific SQL query,
//! runs it, repairs it from the store's error messages, and explains the
//! result.
//!
//! ```ignore
//! let pipeline = Pipeline::from_config(&config)?;
//! let result = pipeline.answer("How many car models fit part 513001?").await;
//! println!("{}", render_markdown(&result));
//! ```

pub mod executor;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod retry;
pub mod selector;
pub mod summarizer;
pub mod synthesizer;

pub use executor::QueryExecutor;
pub use pipeline::Pipeline;
pub use prompt::GenerationParams;
pub use render::render_markdown;
pub use retry::{RetryController, RetryReport};
pub use selector::{match_tables, TableSelector};
pub use summarizer::ResultSummarizer;
pub use synthesizer::SqlSynthesizer;
