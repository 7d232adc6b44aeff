use controller_core::{Error, Result};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Structured output for the audit commands. No format means a one-line summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            other => Err(Error::InvalidParameters(format!(
                "output format {other:?} not supported, allowed formats are: json, yaml"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

/// Inputs fixed for the whole run and handed to every decision
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    decommissioned: BTreeSet<String>,
    dry_run: bool,
    output: Option<OutputFormat>,
}

impl RunConfig {
    /// Fails when no cluster is given or a cluster name is blank.
    pub fn new<I, S>(decommissioned: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut clusters = BTreeSet::new();
        for cluster in decommissioned {
            let cluster = cluster.as_ref().trim();
            if cluster.is_empty() {
                return Err(Error::InvalidParameters(
                    "decommissioned cluster names must not be empty".into(),
                ));
            }
            clusters.insert(cluster.to_string());
        }
        if clusters.is_empty() {
            return Err(Error::InvalidParameters(
                "at least one decommissioned cluster is required".into(),
            ));
        }
        Ok(Self {
            decommissioned: clusters,
            dry_run: false,
            output: None,
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_output(mut self, output: Option<OutputFormat>) -> Self {
        self.output = output;
        self
    }

    pub fn decommissioned(&self) -> &BTreeSet<String> {
        &self.decommissioned
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn output(&self) -> Option<OutputFormat> {
        self.output
    }
}
