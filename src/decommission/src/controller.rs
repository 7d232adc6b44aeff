use crate::action::{needs_contender_check, resolve_action, Action};
use crate::config::RunConfig;
use crate::contender::{is_contender, ContenderSelector, LatestGeneration};
use crate::model::{OutputRelease, Release};
use crate::store::ReleaseStore;
use controller_core::{Error, Result};

use std::fmt;
use std::sync::Arc;
use tracing::*;

// Context shared by every step of a run
#[derive(Clone)]
pub struct Context {
    /// Where releases and applications are read from and written to
    pub store: Arc<dyn ReleaseStore>,
    /// Rule picking an application's contender
    pub selector: Arc<dyn ContenderSelector>,
}

impl Context {
    pub fn new(store: Arc<dyn ReleaseStore>) -> Self {
        Self {
            store,
            selector: Arc::new(LatestGeneration),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn ContenderSelector>) -> Self {
        self.selector = selector;
        self
    }
}

/// An item that could not be processed
#[derive(Debug)]
pub struct Failure {
    /// Release (`namespace/name`) or namespace the error belongs to
    pub item: String,
    pub error: Error,
}

/// Result of a run that keeps going past per-item errors
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub failures: Vec<Failure>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, item: impl fmt::Display, error: Error) {
        let kind = if error.is_io() { "store" } else { "domain" };
        warn!(item = %item, kind, "Skipping: {}", error);
        self.failures.push(Failure {
            item: item.to_string(),
            error,
        });
    }

    /// Folds every recorded failure into one error
    pub fn check(&self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(Error::Aggregate(
            self.failures
                .iter()
                .map(|failure| format!("{}: {}", failure.item, failure.error))
                .collect(),
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    Done,
    DryRun,
    Failed,
}

impl fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStatus::Done => f.write_str("done"),
            WriteStatus::DryRun => f.write_str("dryrun"),
            WriteStatus::Failed => f.write_str("failed"),
        }
    }
}

/// A reannotation or deletion decided during a clean run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanEntry {
    pub release: OutputRelease,
    pub action: Action,
    pub status: WriteStatus,
}

impl fmt::Display for CleanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Action::Reannotate(record) => write!(
                f,
                "Editing annotations of release {} to {}...{}",
                self.release, record, self.status
            ),
            Action::Delete => write!(f, "Deleting release {}...{}", self.release, self.status),
            Action::NoOp => write!(f, "Leaving release {} untouched", self.release),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleanReport {
    pub entries: Vec<CleanEntry>,
}

impl CleanReport {
    pub fn actions(&self) -> Vec<(&OutputRelease, &Action)> {
        self.entries
            .iter()
            .map(|entry| (&entry.release, &entry.action))
            .collect()
    }
}

/// Drops decommissioned clusters from every release of every namespace.
///
/// Releases left with live clusters get their scheduling record rewritten,
/// releases left with none are deleted unless they are their application's
/// contender. Only failing to list namespaces aborts the run; everything else
/// is recorded in the outcome.
pub async fn clean(ctx: &Context, config: &RunConfig) -> Result<Outcome<CleanReport>> {
    let namespaces = ctx.store.list_namespaces().await?;
    info!(
        "Cleaning releases of {} namespaces from decommissioned clusters {:?} (dry run: {})",
        namespaces.len(),
        config.decommissioned(),
        config.dry_run(),
    );

    let mut outcome = Outcome::new(CleanReport::default());
    for ns in namespaces {
        let releases = match ctx.store.list_releases(&ns, None).await {
            Ok(releases) => releases,
            Err(err) => {
                outcome.record(format!("namespace {ns}"), err);
                continue;
            }
        };
        for release in releases {
            let reference = release.reference();
            if let Err(err) = clean_release(ctx, config, release, &mut outcome.value).await {
                outcome.record(reference, err);
            }
        }
    }

    info!(
        "Clean finished: {} releases acted upon, {} failures",
        outcome.value.entries.len(),
        outcome.failures.len(),
    );
    Ok(outcome)
}

#[instrument(skip_all, fields(release = %release.reference()))]
async fn clean_release(
    ctx: &Context,
    config: &RunConfig,
    mut release: Release,
    report: &mut CleanReport,
) -> Result<()> {
    let contender = if needs_contender_check(&release, config) {
        is_contender(ctx, &release).await?
    } else {
        false
    };
    let action = resolve_action(&release, config, contender);
    let reference = release.reference();

    match &action {
        Action::NoOp => {
            debug!("Nothing to do for release {} (contender: {})", reference, contender);
            return Ok(());
        }
        Action::Reannotate(record) => {
            info!("Editing annotations of release {} to {}", reference, record);
        }
        Action::Delete => {
            if release.selected_clusters().is_empty() {
                warn!(
                    "Release {} is not scheduled on any cluster, deleting it like a fully decommissioned one",
                    reference
                );
            }
            info!("Deleting release {}", reference);
        }
    }

    if config.dry_run() {
        report.entries.push(CleanEntry {
            release: reference,
            action,
            status: WriteStatus::DryRun,
        });
        return Ok(());
    }

    let written = apply(ctx, &mut release, &action).await;
    let status = if written.is_ok() {
        WriteStatus::Done
    } else {
        WriteStatus::Failed
    };
    report.entries.push(CleanEntry {
        release: reference,
        action,
        status,
    });
    written
}

async fn apply(ctx: &Context, release: &mut Release, action: &Action) -> Result<()> {
    match action {
        Action::NoOp => Ok(()),
        Action::Reannotate(record) => {
            release.set_recorded_clusters(record.clone());
            ctx.store.update_release(release).await
        }
        Action::Delete => {
            let reference = release.reference();
            ctx.store
                .delete_release(&reference.namespace, &reference.name)
                .await
        }
    }
}
