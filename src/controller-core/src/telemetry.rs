use crate::{Error, Result};

use std::str::FromStr;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "info";

/// Shape of the log lines written to stderr
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::InvalidParameters(format!(
                "log format {other:?} not supported, allowed formats are: text, json"
            ))),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize tracing
///
/// Logs go to stderr so that stdout stays free for reports.
pub fn init(format: LogFormat) -> Result<()> {
    let registry = Registry::default().with(env_filter());
    let res = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    res.map_err(|err| Error::InvalidParameters(format!("failed to install log subscriber: {err}")))
}
