//! askdb entry point.

mod args;
mod error;
mod logging;

use args::{CliArgs, Command};
use askdb_catalog::export_snapshot;
use askdb_core::{AskConfig, ConfigError};
use askdb_pipeline::{render_markdown, Pipeline};
use clap::Parser;
use error::CliError;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("askdb: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let args = CliArgs::parse();
    logging::init_logging(args.log_json)?;
    let config = load_config(&args)?;
    let pipeline = Pipeline::from_config(&config)?;
    tracing::debug!(?pipeline, "pipeline ready");

    match args.command {
        Command::Ask { question, json } => {
            let result = pipeline.answer(&question.join(" ")).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", render_markdown(&result));
            }
            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Tables => {
            for table in pipeline.catalog().list_tables().await? {
                println!("{}", table);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Columns { table } => {
            println!("{}", pipeline.catalog().schema(&table).await?.prompt_block());
            Ok(ExitCode::SUCCESS)
        }
        Command::Schema { out } => {
            let settings = pipeline.config();
            let snapshot = export_snapshot(
                pipeline.catalog(),
                settings.dialect.dialect(),
                &settings.database_name,
                &settings.few_shot_examples,
            )
            .await?;
            let yaml = snapshot.to_yaml()?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, yaml).await?;
                    tracing::info!(
                        path = %path.display(),
                        tables = snapshot.tables.len(),
                        "schema snapshot written"
                    );
                }
                None => print!("{}", yaml),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(args: &CliArgs) -> Result<AskConfig, CliError> {
    let path = args.config.as_deref().ok_or(ConfigError::MissingConfigPath)?;
    Ok(AskConfig::from_path(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const EXAMPLE_CONFIG: &str = include_str!("../../askdb.example.toml");

    #[test]
    fn test_example_config_is_valid() {
        let config = AskConfig::from_toml_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.completion.stage_models.summary.as_deref(), Some("llama3.2:3b"));
        assert_eq!(config.pipeline.few_shot_examples.len(), 1);
    }

    #[test]
    fn test_load_config_requires_path() {
        let args = CliArgs {
            config: None,
            log_json: false,
            command: Command::Tables,
        };
        assert!(matches!(
            load_config(&args),
            Err(CliError::Config(ConfigError::MissingConfigPath))
        ));
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let args = CliArgs {
            config: Some(PathBuf::from("/nonexistent/askdb.toml")),
            log_json: false,
            command: Command::Tables,
        };
        assert!(matches!(load_config(&args), Err(CliError::Config(ConfigError::Io(_)))));
    }
}
