//! Tracing subscriber setup.

use crate::error::CliError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable selecting the log format ("json" or "text").
pub const LOG_FORMAT_ENV_VAR: &str = "ASKDB_LOG_FORMAT";

const DEFAULT_FILTER: &str = "askdb=info,info";

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// command output.
pub fn init_logging(json: bool) -> Result<(), CliError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let fmt_layer = if json || json_from_env() {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))
}

fn json_from_env() -> bool {
    std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
