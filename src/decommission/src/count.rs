use crate::action::live_clusters;
use crate::config::{OutputFormat, RunConfig};
use crate::contender::resolve_contender;
use crate::controller::{Context, Outcome};
use crate::model::{OutputRelease, Release};
use controller_core::{Error, Result};

use kube::ResourceExt;
use std::fmt;
use tracing::{debug, info};

/// What the audit counts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountKind {
    Releases,
    Contenders,
}

impl fmt::Display for CountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountKind::Releases => f.write_str("releases"),
            CountKind::Contenders => f.write_str("contenders"),
        }
    }
}

/// Releases scheduled only on decommissioned clusters
#[derive(Clone, Debug, PartialEq)]
pub struct CountReport {
    pub kind: CountKind,
    pub matches: Vec<OutputRelease>,
}

impl CountReport {
    fn new(kind: CountKind) -> Self {
        Self {
            kind,
            matches: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.matches.len()
    }

    fn tally(&mut self, release: &Release, config: &RunConfig) {
        if live_clusters(release, config).is_empty() {
            debug!("Release {} has no live cluster left", release.reference());
            self.matches.push(release.reference());
        }
    }
}

/// Counts every release with no live cluster left. Never writes.
pub async fn count_releases(ctx: &Context, config: &RunConfig) -> Result<Outcome<CountReport>> {
    let namespaces = ctx.store.list_namespaces().await?;
    let mut outcome = Outcome::new(CountReport::new(CountKind::Releases));
    for ns in namespaces {
        match ctx.store.list_releases(&ns, None).await {
            Ok(releases) => {
                for release in &releases {
                    outcome.value.tally(release, config);
                }
            }
            Err(err) => outcome.record(format!("namespace {ns}"), err),
        }
    }
    info!("Counted {} {}", outcome.value.count(), outcome.value.kind);
    Ok(outcome)
}

/// Counts every application whose contender has no live cluster left. Never writes.
pub async fn count_contenders(ctx: &Context, config: &RunConfig) -> Result<Outcome<CountReport>> {
    let namespaces = ctx.store.list_namespaces().await?;
    let mut outcome = Outcome::new(CountReport::new(CountKind::Contenders));
    for ns in namespaces {
        let apps = match ctx.store.list_applications(&ns).await {
            Ok(apps) => apps,
            Err(err) => {
                outcome.record(format!("namespace {ns}"), err);
                continue;
            }
        };
        for app in &apps {
            match resolve_contender(ctx, app).await {
                Ok(contender) => outcome.value.tally(&contender, config),
                Err(err) => outcome.record(format!("{}/{}", ns, app.name_any()), err),
            }
        }
    }
    info!("Counted {} {}", outcome.value.count(), outcome.value.kind);
    Ok(outcome)
}

/// Renders the report for stdout: a summary line, or the matches as JSON or YAML.
pub fn render(report: &CountReport, format: Option<OutputFormat>) -> Result<String> {
    match format {
        None => Ok(format!(
            "Number of *{}* that are scheduled only on decommissioned clusters: {}",
            report.kind,
            report.count()
        )),
        Some(OutputFormat::Json) => {
            serde_json::to_string_pretty(&report.matches).map_err(Error::SerializationError)
        }
        Some(OutputFormat::Yaml) => serde_yaml::to_string(&report.matches).map_err(Error::YamlError),
    }
}
